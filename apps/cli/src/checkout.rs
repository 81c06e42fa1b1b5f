use async_trait::async_trait;
use console::style;
use shortreels_core::{CheckoutOptions, PaymentReceipt, PaymentWidget, WidgetOutcome};
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

/// Checkout in the terminal: prints the order the way the hosted widget
/// would show it, then reads back what the provider returned.
pub struct TerminalCheckout {
    input: Mutex<BufReader<Stdin>>,
}

impl TerminalCheckout {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    async fn prompt(&self, label: &str) -> std::io::Result<String> {
        println!("{} {}", style("?").yellow().bold(), label);
        let mut line = String::new();
        self.input.lock().await.read_line(&mut line).await?;
        Ok(line.trim().to_string())
    }
}

fn print_options(options: &CheckoutOptions) {
    println!("{}", style("─".repeat(60)).dim());
    println!("  {}", style(&options.name).cyan().bold());
    println!("  {}", options.description);
    println!(
        "  {} {} {}",
        style("Amount:").dim(),
        options.amount,
        style(format!("({} smallest unit)", options.currency)).dim()
    );
    println!("  {} {}", style("Order:").dim(), options.order_id);
    println!("  {} {}", style("Key:").dim(), options.key);
    for (name, note) in &options.notes {
        println!("  {} {}", style(format!("{name}:")).dim(), note);
    }
    println!("{}", style("─".repeat(60)).dim());
}

#[async_trait]
impl PaymentWidget for TerminalCheckout {
    async fn open(&self, options: CheckoutOptions) -> WidgetOutcome {
        print_options(&options);

        let payment_id = match self.prompt("Payment id (empty to cancel):").await {
            Ok(id) if id.is_empty() => return WidgetOutcome::Dismissed,
            Ok(id) => id,
            Err(e) => {
                return WidgetOutcome::Failed {
                    description: e.to_string(),
                };
            }
        };
        let signature = match self.prompt("Payment signature:").await {
            Ok(sig) if sig.is_empty() => return WidgetOutcome::Dismissed,
            Ok(sig) => sig,
            Err(e) => {
                return WidgetOutcome::Failed {
                    description: e.to_string(),
                };
            }
        };

        WidgetOutcome::Completed(PaymentReceipt {
            payment_id,
            order_id: options.order_id,
            signature,
        })
    }
}

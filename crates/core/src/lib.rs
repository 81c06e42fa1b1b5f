pub mod api;
pub mod config;
pub mod environment;
pub mod error;
pub mod events;
pub mod format;
pub mod lifecycle;
pub mod paths;
pub mod payment;
pub mod resume;
pub mod session;
pub mod store;
pub mod types;
pub mod validation;

pub use api::{ApiClient, HttpTransport, RetryPolicy, Transport};
pub use config::{ClientConfig, ConfigOverrides, TimingConfig};
pub use environment::Environment;
pub use error::{ApiError, ErrorKind, Result, ShortreelsError};
pub use events::{SessionEvent, ViewBatch, ViewReceiver, ViewSender, view_channel};
pub use format::{format_duration, format_price};
pub use lifecycle::{GenerationRequest, ProcessingStep, RequestStatus};
pub use payment::{CheckoutOptions, PaymentOutcome, PaymentReceipt, PaymentWidget, WidgetOutcome};
pub use session::{Session, TimerKind};
pub use store::{PersistedState, StateStore};
pub use validation::{MAX_WORDS, MIN_WORDS, can_generate, word_count};

use std::path::{Path, PathBuf};

/// Storage key of the persisted session state
pub const STATE_KEY: &str = "shortreels_state";

pub fn get_root_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("shortreels")
}

pub fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("shortreels")
        .join("config.json")
}

/// Path of the persisted session state inside a state directory
pub fn get_state_path(state_dir: &Path) -> PathBuf {
    state_dir.join(format!("{}.json", STATE_KEY))
}

/// Target file for a downloaded artifact
pub fn get_download_path(dir: &Path, request_id: &str, watermarked: bool) -> PathBuf {
    if watermarked {
        dir.join(format!("shortreels-{}-preview.mp4", request_id))
    } else {
        dir.join(format!("shortreels-{}.mp4", request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_file_uses_storage_key() {
        let path = get_state_path(Path::new("/var/lib/sr"));
        assert_eq!(path, PathBuf::from("/var/lib/sr/shortreels_state.json"));
    }

    #[test]
    fn paid_download_name() {
        let path = get_download_path(Path::new("out"), "abc", false);
        assert_eq!(path, PathBuf::from("out/shortreels-abc.mp4"));
    }
}

use std::path::PathBuf;
use std::time::Duration;

pub const PRICE_API_URL: &str = "http://www.xinfadi.com.cn/getPriceData.html";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/94.0.4606.81 Safari/537.36";

pub const DEFAULT_PAGE_SIZE: u32 = 40;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(350);

pub const DEFAULT_STORE_FILE: &str = "price_detail.csv";

/// Wire date format for the `pubDateStartTime` / `pubDateEndTime` filters.
pub const REQUEST_DATE_FORMAT: &str = "%Y/%m/%d";

pub fn default_data_dir() -> PathBuf {
    if let Some(data) = dirs::data_local_dir() {
        data.join("produce-prices")
    } else {
        PathBuf::from(".produce-prices")
    }
}

pub fn default_store_path() -> PathBuf {
    default_data_dir().join(DEFAULT_STORE_FILE)
}

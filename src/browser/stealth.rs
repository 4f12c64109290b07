//! Anti-bot countermeasures and block detection.
//!
//! Pages get an init script that hides automation markers and a user agent
//! drawn from the configured pool. A rendered page whose text matches
//! [`BLOCK_PATTERN`] is treated as an anti-bot interstitial.

use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use rand::rng;
use regex::Regex;

/// Visible-text pattern of block and challenge pages.
pub static BLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)access denied|blocked|cloudflare").unwrap());

/// Hides `navigator.webdriver` before any page script runs.
pub const STEALTH_SCRIPT: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true,
    });
})();
"#;

/// Pick a user agent from `pool` at random.
///
/// Returns `None` only for an empty pool, which config validation rejects.
pub fn random_user_agent(pool: &[String]) -> Option<&str> {
    pool.choose(&mut rng()).map(String::as_str)
}

//! Local server helpers

/// Base URL of the shell under test, `E2E_BASE_URL` or the dev server default
pub fn base_url() -> String {
    std::env::var("E2E_BASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| "http://localhost:3000".to_string())
}

/// Check if a local server is available
pub async fn is_server_available(url: &str) -> bool {
    match reqwest::get(url).await {
        Ok(resp) => resp.status().is_success() || resp.status().is_redirection(),
        Err(_) => false,
    }
}

/// Macro to skip test if the shell isn't running
#[macro_export]
macro_rules! require_local_server {
    ($url:expr) => {{
        if !server::is_server_available($url).await {
            eprintln!("Skipping: Shell not running at {}", $url);
            eprintln!("  To run these tests, start the shell and its micro-frontends,");
            eprintln!("  or point E2E_BASE_URL at a running deployment.");
            return;
        }
    }};
}

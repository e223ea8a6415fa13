//! Browser automation helpers

use role_harness::config::HarnessConfig;
use role_harness::driver::ChromeFactory;

/// Check if browser tests should be skipped (when Chrome isn't available)
pub fn should_skip() -> bool {
    std::env::var("SKIP_BROWSER_TESTS").is_ok()
}

/// Macro to skip test if Chrome isn't available
#[macro_export]
macro_rules! skip_if_no_chrome {
    () => {
        if browser::should_skip() {
            eprintln!("Skipping test: SKIP_BROWSER_TESTS is set");
            return;
        }
    };
}

/// Find Chrome for Testing installed by Puppeteer
pub fn find_chrome_for_testing() -> Option<std::path::PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let puppeteer_cache = std::path::Path::new(&home).join(".cache/puppeteer/chrome");

    let entries = std::fs::read_dir(&puppeteer_cache).ok()?;
    let mut versions: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .collect();
    versions.sort_by_key(|v| std::cmp::Reverse(v.path()));

    for version_dir in versions {
        for candidate in [
            // macOS arm64
            "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
            // macOS x64
            "chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
            // Linux
            "chrome-linux64/chrome",
        ] {
            let path = version_dir.path().join(candidate);
            if path.exists() {
                return Some(path);
            }
        }
    }
    None
}

/// Browser settings for tests: headless, Chrome for Testing when installed
pub fn test_harness_config(base_url: &str) -> HarnessConfig {
    let mut config = HarnessConfig {
        base_url: base_url.to_string(),
        ..HarnessConfig::default()
    };
    if let Some(chrome_path) = find_chrome_for_testing() {
        eprintln!("Using Chrome for Testing: {}", chrome_path.display());
        config.chrome_executable = Some(chrome_path);
    }
    config
}

/// Try to launch a browser, skip test if Chrome not found
pub async fn require_factory(config: &HarnessConfig) -> Option<ChromeFactory> {
    match ChromeFactory::launch(config).await {
        Ok(factory) => Some(factory),
        Err(e) => {
            if e.to_string().contains("Could not auto detect") {
                eprintln!("Skipping: Chrome not installed ({})", e);
                None
            } else {
                panic!("Unexpected browser error: {}", e);
            }
        }
    }
}

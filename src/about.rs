pub const GIBSON_DISPLAY_VERSION: &str = env!("GIBSON_DISPLAY_VERSION");
pub const GIBSON_BUILD_N: &str = env!("GIBSON_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "gibson-planner {}\nBuild {}\nCost-optimal Gibson Assembly planning",
        GIBSON_DISPLAY_VERSION, GIBSON_BUILD_N
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_cli_text() {
        let text = version_cli_text();
        assert!(text.starts_with("gibson-planner "));
        assert!(text.contains(GIBSON_BUILD_N));
    }
}

use commission_link::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../commission-link.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.api.timeout_seconds, 15);
    assert_eq!(cfg.input.env_var, "STEP4_RESULT_JSON");
    assert_eq!(cfg.report.user.as_deref(), Some("DevonWest"));
}

#[test]
fn partial_config_keeps_defaults() {
    let cfg: Config = toml::from_str("[api]\nbase_url = \"http://localhost:9/api\"\n").expect("parse");
    assert_eq!(cfg.api.base_url, "http://localhost:9/api");
    assert_eq!(cfg.api.timeout_seconds, 15);
    assert_eq!(cfg.api.max_response_chars, 500);
    assert_eq!(cfg.credentials.api_key_env, "KIZEN_API_KEY");
    assert!(!cfg.linker.force_simulation);
}

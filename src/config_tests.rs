// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use super::super::{Config, LogLevel};
    use clap::Parser;
    use std::time::Duration;

    fn parse(extra: &[&str]) -> Result<Config, clap::Error> {
        let mut args = vec![
            "tunnel-manager",
            "--account-id",
            "acct-1",
            "--tunnel-id",
            "tunnel-1",
            "--api-token",
            "secret-token",
        ];
        args.extend_from_slice(extra);
        Config::try_parse_from(args)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.hostnames_annotation, "cloudflare-tunnel-hostnames");
        assert_eq!(config.upstream_port_annotation, "cloudflare-tunnel-upstream-port");
        assert_eq!(config.sync_interval(), Duration::from_secs(15));
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.tunnel_target_suffix, "cfargotunnel.com");
        assert_eq!(config.managed_record_marker, "managed by tunnel-manager");
        assert_eq!(config.metrics_bind_address.port(), 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sync_interval_must_be_positive() {
        assert!(parse(&["--sync-interval", "0"]).is_err());
        assert!(parse(&["--sync-interval", "-5"]).is_err());
        assert!(parse(&["--sync-interval", "soon"]).is_err());
        assert_eq!(
            parse(&["--sync-interval", "60"]).unwrap().sync_interval(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_log_level_values() {
        assert_eq!(
            parse(&["--log-level", "debug"]).unwrap().log_level,
            LogLevel::Debug
        );
        assert_eq!(
            parse(&["--log-level", "WARN"]).unwrap().log_level,
            LogLevel::Warn
        );
        assert!(parse(&["--log-level", "verbose"]).is_err());
        assert_eq!(LogLevel::Error.as_filter(), "error");
    }

    #[test]
    fn test_validate_rejects_blank_values() {
        let mut config = parse(&[]).unwrap();
        config.managed_record_marker = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("MANAGED_RECORD_MARKER"));

        let mut config = parse(&[]).unwrap();
        config.account_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_controller_settings() {
        let config = parse(&[
            "--tunnel-target-suffix",
            "tunnels.example.net",
            "--hostnames-annotation",
            "example.io/hosts",
        ])
        .unwrap();

        let settings = config.controller_settings();
        assert_eq!(settings.tunnel_target, "tunnel-1.tunnels.example.net");
        assert_eq!(settings.conventions.hostnames_annotation, "example.io/hosts");
        assert_eq!(settings.account_id, "acct-1");
        assert_eq!(settings.interval, Duration::from_secs(15));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", parse(&[]).unwrap());
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}

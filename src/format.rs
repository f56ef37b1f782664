use crate::api::{Tunnel, TunnelStatus};

// Display helpers shared by the dashboard and the CLI tables. Metric columns
// show one decimal with a unit when the value is present and "N/A" when it
// is not; zero is a real reading, not an absence.

pub fn format_cpu(cpu: Option<f64>) -> String {
    match cpu {
        Some(value) => format!("{:.1}%", value),
        None => "N/A".to_string(),
    }
}

pub fn format_memory(memory: Option<f64>) -> String {
    match memory {
        Some(value) => format!("{:.1}MB", value),
        None => "N/A".to_string(),
    }
}

pub fn proxied_label(proxied: bool) -> &'static str {
    if proxied {
        "ON"
    } else {
        "OFF"
    }
}

// Port input is validated before any request is built. Zero is not a
// routable target port.
pub fn parse_port(input: &str) -> Option<u16> {
    input.trim().parse::<u16>().ok().filter(|&port| port != 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Start,
    Stop,
    Delete,
}

// The lifecycle action offered for a row is exclusive on status; delete is
// always offered.
pub fn tunnel_actions(status: TunnelStatus) -> [RowAction; 2] {
    match status {
        TunnelStatus::Running => [RowAction::Stop, RowAction::Delete],
        TunnelStatus::Stopped => [RowAction::Start, RowAction::Delete],
    }
}

pub fn running_count(tunnels: &[Tunnel]) -> usize {
    tunnels
        .iter()
        .filter(|t| t.status == TunnelStatus::Running)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel(name: &str, status: TunnelStatus) -> Tunnel {
        Tunnel {
            name: name.to_string(),
            domain: format!("{}.example.com", name),
            port: 3000,
            status,
            cpu: None,
            memory: None,
        }
    }

    #[test]
    fn test_format_cpu_zero_is_a_reading() {
        assert_eq!(format_cpu(Some(0.0)), "0.0%");
        assert_eq!(format_cpu(Some(12.34)), "12.3%");
    }

    #[test]
    fn test_format_cpu_absent_is_not_applicable() {
        assert_eq!(format_cpu(None), "N/A");
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(Some(128.0)), "128.0MB");
        assert_eq!(format_memory(Some(42.567)), "42.6MB");
        assert_eq!(format_memory(None), "N/A");
    }

    #[test]
    fn test_proxied_label() {
        assert_eq!(proxied_label(true), "ON");
        assert_eq!(proxied_label(false), "OFF");
    }

    #[test]
    fn test_parse_port_accepts_valid_ports() {
        assert_eq!(parse_port("3000"), Some(3000));
        assert_eq!(parse_port(" 443 "), Some(443));
        assert_eq!(parse_port("65535"), Some(65535));
    }

    #[test]
    fn test_parse_port_rejects_bad_input() {
        assert_eq!(parse_port("abc"), None);
        assert_eq!(parse_port(""), None);
        assert_eq!(parse_port("70000"), None);
        assert_eq!(parse_port("-1"), None);
        assert_eq!(parse_port("0"), None);
    }

    #[test]
    fn test_tunnel_actions_exclusive_on_status() {
        let running = tunnel_actions(TunnelStatus::Running);
        assert_eq!(running, [RowAction::Stop, RowAction::Delete]);
        assert!(!running.contains(&RowAction::Start));

        let stopped = tunnel_actions(TunnelStatus::Stopped);
        assert_eq!(stopped, [RowAction::Start, RowAction::Delete]);
        assert!(!stopped.contains(&RowAction::Stop));
    }

    #[test]
    fn test_running_count_derived_from_collection() {
        let tunnels = vec![
            tunnel("api", TunnelStatus::Running),
            tunnel("blog", TunnelStatus::Stopped),
            tunnel("grafana", TunnelStatus::Running),
        ];
        assert_eq!(running_count(&tunnels), 2);
        assert_eq!(running_count(&[]), 0);
    }
}

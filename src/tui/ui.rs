use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use super::app::{App, InputMode, Tab, ToastLevel, DNS_RECORD_TYPES, PROXY_CHOICES};
use crate::api::TunnelStatus;
use crate::format::{self, RowAction};

pub fn render(f: &mut Frame, app: &App) {
    // Main layout: tab header, active table, status line, help bar at bottom
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab header with counters
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status line
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    render_header(f, app, main_chunks[0]);

    // Render whichever table the active tab selects
    match app.tab {
        Tab::Tunnels => render_tunnels(f, app, main_chunks[1]),
        Tab::Dns => render_dns_records(f, app, main_chunks[1]),
    }

    // Render status line
    render_status_line(f, app, main_chunks[2]);

    // Render help bar
    render_help_bar(f, app, main_chunks[3]);

    // Render modals/dialogs on top
    match app.input_mode {
        InputMode::TunnelAddName => render_text_dialog(
            f,
            " Add Tunnel ",
            vec![],
            "Enter subdomain (leave blank for a generated name):",
            &app.input,
            false,
        ),
        InputMode::TunnelAddPort => {
            let subdomain = app.new_tunnel_subdomain.as_deref().unwrap_or("");
            let shown = if subdomain.is_empty() {
                "(generated)"
            } else {
                subdomain
            };
            render_text_dialog(
                f,
                " Add Tunnel ",
                vec![field_line("Subdomain: ", shown)],
                "Enter local port (e.g., 3000):",
                &app.input,
                false,
            );
        }
        InputMode::DnsAddName => render_text_dialog(
            f,
            " Add DNS Record ",
            vec![],
            "Enter subdomain:",
            &app.input,
            false,
        ),
        InputMode::DnsAddType => render_choice_dialog(
            f,
            " Add DNS Record ",
            vec![field_line(
                "Name: ",
                app.new_record_name.as_deref().unwrap_or(""),
            )],
            "Select record type:",
            &DNS_RECORD_TYPES,
            app.choice_selected,
        ),
        InputMode::DnsAddContent => render_text_dialog(
            f,
            " Add DNS Record ",
            vec![
                field_line("Name: ", app.new_record_name.as_deref().unwrap_or("")),
                field_line("Type: ", app.new_record_type.as_deref().unwrap_or("")),
            ],
            "Enter target (IP address or hostname):",
            &app.input,
            false,
        ),
        InputMode::DnsAddProxied => render_choice_dialog(
            f,
            " Add DNS Record ",
            vec![
                field_line("Name: ", app.new_record_name.as_deref().unwrap_or("")),
                field_line("Type: ", app.new_record_type.as_deref().unwrap_or("")),
                field_line("Target: ", app.new_record_content.as_deref().unwrap_or("")),
            ],
            "Proxied:",
            &PROXY_CHOICES,
            app.choice_selected,
        ),
        InputMode::DnsEditType => render_choice_dialog(
            f,
            " Edit DNS Record ",
            vec![field_line("Editing: ", editing_record_name(app))],
            "Select record type:",
            &DNS_RECORD_TYPES,
            app.choice_selected,
        ),
        InputMode::DnsEditContent => render_text_dialog(
            f,
            " Edit DNS Record ",
            vec![
                field_line("Editing: ", editing_record_name(app)),
                field_line("Type: ", app.new_record_type.as_deref().unwrap_or("")),
            ],
            "Enter content:",
            &app.input,
            false,
        ),
        InputMode::DnsEditProxied => render_choice_dialog(
            f,
            " Edit DNS Record ",
            vec![
                field_line("Editing: ", editing_record_name(app)),
                field_line("Type: ", app.new_record_type.as_deref().unwrap_or("")),
                field_line("Content: ", app.new_record_content.as_deref().unwrap_or("")),
            ],
            "Proxied:",
            &PROXY_CHOICES,
            app.choice_selected,
        ),
        InputMode::PasswordCurrent => render_text_dialog(
            f,
            " Change Password ",
            vec![],
            "Enter current password:",
            &app.input,
            true,
        ),
        InputMode::PasswordNew => render_text_dialog(
            f,
            " Change Password ",
            vec![],
            "Enter new password:",
            &app.input,
            true,
        ),
        InputMode::Confirm => {
            if let Some(ref msg) = app.confirm_message {
                render_confirm_dialog(f, msg);
            }
        }
        InputMode::Help => render_help_modal(f),
        InputMode::Normal => {}
    }
}

// Name of the record the edit dialog was opened on. Selection is frozen
// while a dialog is open, so the rendered row is still the right one.
fn editing_record_name(app: &App) -> &str {
    app.dns_records
        .get(app.selected_record)
        .map(|r| r.name.as_str())
        .unwrap_or("")
}

fn field_line(label: &'static str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw(label),
        Span::styled(value.to_string(), Style::default().fg(Color::Green)),
    ])
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let tab_style = |active: bool| {
        if active {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let line = Line::from(vec![
        Span::styled(" Tunnels ", tab_style(app.tab == Tab::Tunnels)),
        Span::raw(" "),
        Span::styled(" DNS Records ", tab_style(app.tab == Tab::Dns)),
        Span::raw("    "),
        Span::styled(
            format!("Tunnels: {}", app.tunnels.len()),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
        Span::styled(
            format!("Running: {}", format::running_count(&app.tunnels)),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  "),
        Span::styled(
            format!("DNS Records: {}", app.dns_records.len()),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" tundeck ")
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_tunnels(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Tunnels ")
        .border_style(Style::default().fg(Color::Cyan));

    if app.tunnels.is_empty() {
        let empty = Paragraph::new("No tunnels found")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("NAME"),
        Cell::from("DOMAIN"),
        Cell::from("PORT"),
        Cell::from("STATUS"),
        Cell::from("CPU"),
        Cell::from("MEMORY"),
    ])
    .style(Style::default().add_modifier(Modifier::DIM))
    .bottom_margin(1);

    let rows: Vec<Row> = app
        .tunnels
        .iter()
        .enumerate()
        .map(|(i, tunnel)| {
            let selected = i == app.selected_tunnel;

            // Base style with optional selection background
            let base_style = if selected {
                Style::default().bg(Color::Rgb(40, 60, 80))
            } else {
                Style::default()
            };

            let name_style = if selected {
                base_style.fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                base_style.fg(Color::Gray)
            };

            let domain_style = if selected {
                base_style.fg(Color::Rgb(150, 150, 150))
            } else {
                base_style.fg(Color::DarkGray)
            };

            let status_color = match tunnel.status {
                TunnelStatus::Running => Color::Green,
                TunnelStatus::Stopped => Color::Yellow,
            };

            Row::new(vec![
                Cell::from(tunnel.name.clone()).style(name_style),
                Cell::from(tunnel.domain.clone()).style(domain_style),
                Cell::from(tunnel.port.to_string()).style(base_style.fg(Color::Gray)),
                Cell::from(format!(
                    "{} {}",
                    tunnel.status.symbol(),
                    tunnel.status.label()
                ))
                .style(base_style.fg(status_color)),
                Cell::from(format::format_cpu(tunnel.cpu)).style(base_style.fg(Color::Gray)),
                Cell::from(format::format_memory(tunnel.memory)).style(base_style.fg(Color::Gray)),
            ])
            .style(base_style)
        })
        .collect();

    let widths = [
        Constraint::Length(20),     // Name
        Constraint::Percentage(35), // Domain
        Constraint::Length(6),      // Port
        Constraint::Length(11),     // Status
        Constraint::Length(8),      // CPU
        Constraint::Length(10),     // Memory
    ];

    let table = Table::new(rows, widths).header(header).block(block);

    f.render_widget(table, area);
}

fn render_dns_records(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" DNS Records ")
        .border_style(Style::default().fg(Color::Cyan));

    if app.dns_records.is_empty() {
        let empty = Paragraph::new("No DNS records found")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("NAME"),
        Cell::from("TYPE"),
        Cell::from("CONTENT"),
        Cell::from("PROXIED"),
    ])
    .style(Style::default().add_modifier(Modifier::DIM))
    .bottom_margin(1);

    let rows: Vec<Row> = app
        .dns_records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let selected = i == app.selected_record;

            let base_style = if selected {
                Style::default().bg(Color::Rgb(40, 60, 80))
            } else {
                Style::default()
            };

            let name_style = if selected {
                base_style.fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                base_style.fg(Color::Gray)
            };

            let proxied_style = if record.proxied {
                base_style.fg(Color::Green)
            } else {
                base_style.fg(Color::DarkGray)
            };

            Row::new(vec![
                Cell::from(record.name.clone()).style(name_style),
                Cell::from(record.record_type.clone()).style(base_style.fg(Color::Cyan)),
                Cell::from(record.content.clone()).style(base_style.fg(Color::Gray)),
                Cell::from(format::proxied_label(record.proxied)).style(proxied_style),
            ])
            .style(base_style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(35), // Name
        Constraint::Length(7),      // Type
        Constraint::Percentage(40), // Content
        Constraint::Length(9),      // Proxied
    ];

    let table = Table::new(rows, widths).header(header).block(block);

    f.render_widget(table, area);
}

fn render_status_line(f: &mut Frame, app: &App, area: Rect) {
    // Only a toast inside its visibility window is shown
    let (status_text, style) = match app.toast.as_ref().filter(|t| t.visible(Instant::now())) {
        Some(toast) => {
            let color = match toast.level {
                ToastLevel::Success => Color::Green,
                ToastLevel::Error => Color::Red,
                ToastLevel::Warning => Color::Yellow,
            };
            (toast.message.clone(), Style::default().fg(color))
        }
        None => (String::new(), Style::default()),
    };

    let status = Paragraph::new(format!(" {}", status_text)).style(style);
    f.render_widget(status, area);
}

fn render_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let help_text = match app.input_mode {
        InputMode::Normal => match app.tab {
            Tab::Tunnels => {
                // Offer only the lifecycle action that applies to the selected row
                let lifecycle = app
                    .tunnels
                    .get(app.selected_tunnel)
                    .map(|t| format::tunnel_actions(t.status)[0])
                    .unwrap_or(RowAction::Start);
                let lifecycle_hint = match lifecycle {
                    RowAction::Stop => "[S]top",
                    _ => "[s]tart",
                };
                format!(
                    " [a]dd {} [d]elete [r]efresh [p]assword [L]ogout [Tab]dns [?]help [q]uit",
                    lifecycle_hint
                )
            }
            Tab::Dns => {
                " [a]dd [e]dit [d]elete [r]efresh [p]assword [L]ogout [Tab]tunnels [?]help [q]uit"
                    .to_string()
            }
        },
        InputMode::TunnelAddName
        | InputMode::TunnelAddPort
        | InputMode::DnsAddName
        | InputMode::DnsAddContent
        | InputMode::DnsEditContent
        | InputMode::PasswordCurrent
        | InputMode::PasswordNew => " Enter value, then press Enter. Esc to cancel.".to_string(),
        InputMode::DnsAddType | InputMode::DnsEditType => {
            " ↑/↓ select type  Enter confirm  Esc cancel".to_string()
        }
        InputMode::DnsAddProxied | InputMode::DnsEditProxied => {
            " ↑/↓ select  Enter confirm  Esc cancel".to_string()
        }
        InputMode::Confirm => " y confirm  n/Esc cancel".to_string(),
        InputMode::Help => " Press Esc or ? to close help".to_string(),
    };

    let help = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));

    f.render_widget(help, area);
}

fn render_text_dialog(
    f: &mut Frame,
    title: &str,
    context: Vec<Line>,
    prompt: &str,
    input: &str,
    mask: bool,
) {
    let area = centered_rect(60, 25, f.area());

    // Clear the area
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    f.render_widget(block, area);

    let shown = if mask {
        "*".repeat(input.chars().count())
    } else {
        input.to_string()
    };

    let mut lines = context;
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        prompt.to_string(),
        Style::default().fg(Color::Yellow),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(
            "> ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(shown, Style::default().fg(Color::Green)),
        Span::styled("_", Style::default().fg(Color::White)),
    ]));

    let text = Paragraph::new(lines)
        .block(Block::default().padding(ratatui::widgets::Padding::new(2, 2, 1, 1)));

    f.render_widget(text, area);
}

fn render_choice_dialog(
    f: &mut Frame,
    title: &str,
    context: Vec<Line>,
    prompt: &str,
    options: &[&str],
    selected: usize,
) {
    let area = centered_rect(60, 40, f.area());

    // Clear the area
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    f.render_widget(block, area);

    let mut lines = context;
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        prompt.to_string(),
        Style::default().fg(Color::Yellow),
    )));
    lines.push(Line::from(""));

    // Add options with selection indicator
    for (i, option) in options.iter().enumerate() {
        let prefix = if i == selected { "> " } else { "  " };
        let style = if i == selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(Span::styled(
            format!("{}{}", prefix, option),
            style,
        )));
    }

    let content = Paragraph::new(lines)
        .block(Block::default().padding(ratatui::widgets::Padding::new(2, 2, 1, 1)));

    f.render_widget(content, area);
}

fn render_confirm_dialog(f: &mut Frame, message: &str) {
    let area = centered_rect(60, 15, f.area());

    // Clear the area
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(" Confirm ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let text = Paragraph::new(message)
        .style(Style::default().fg(Color::Yellow))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::NONE));
    f.render_widget(text, inner);
}

fn render_help_modal(f: &mut Frame) {
    let area = centered_rect(70, 80, f.area());

    // Clear the area
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(" Help - Press Esc to close ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let help_text = vec![
        Line::from(Span::styled(
            "NAVIGATION",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  ↑/k      ", Style::default().fg(Color::Cyan)),
            Span::raw("Move selection up"),
        ]),
        Line::from(vec![
            Span::styled("  ↓/j      ", Style::default().fg(Color::Cyan)),
            Span::raw("Move selection down"),
        ]),
        Line::from(vec![
            Span::styled("  Tab      ", Style::default().fg(Color::Cyan)),
            Span::raw("Switch between tunnels and DNS records"),
        ]),
        Line::from(vec![
            Span::styled("  q        ", Style::default().fg(Color::Cyan)),
            Span::raw("Quit tundeck"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "TUNNELS",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  a        ", Style::default().fg(Color::Cyan)),
            Span::raw("Add a new tunnel"),
        ]),
        Line::from(vec![
            Span::styled("  s        ", Style::default().fg(Color::Cyan)),
            Span::raw("Start selected tunnel"),
        ]),
        Line::from(vec![
            Span::styled("  S        ", Style::default().fg(Color::Cyan)),
            Span::raw("Stop selected tunnel"),
        ]),
        Line::from(vec![
            Span::styled("  d        ", Style::default().fg(Color::Cyan)),
            Span::raw("Delete selected tunnel (stops it first)"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "DNS RECORDS",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  a        ", Style::default().fg(Color::Cyan)),
            Span::raw("Add a new DNS record"),
        ]),
        Line::from(vec![
            Span::styled("  e        ", Style::default().fg(Color::Cyan)),
            Span::raw("Edit selected record (type, content, proxied)"),
        ]),
        Line::from(vec![
            Span::styled("  d        ", Style::default().fg(Color::Cyan)),
            Span::raw("Delete selected record"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "SESSION",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  r        ", Style::default().fg(Color::Cyan)),
            Span::raw("Refresh tunnels and DNS records"),
        ]),
        Line::from(vec![
            Span::styled("  p        ", Style::default().fg(Color::Cyan)),
            Span::raw("Change the server password"),
        ]),
        Line::from(vec![
            Span::styled("  L        ", Style::default().fg(Color::Cyan)),
            Span::raw("Log out and quit"),
        ]),
        Line::from(""),
        Line::from(vec![Span::raw(
            "  Every change is re-read from the server; the tables always",
        )]),
        Line::from(vec![Span::raw("  show what the server last returned.")]),
    ];

    let help = Paragraph::new(help_text).wrap(Wrap { trim: false });

    f.render_widget(help, inner);
}

// Create a centered rect of given percentage of the parent
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, DnsRecord, Tunnel};
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;

    fn test_app() -> App {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        App::new(client)
    }

    // Draw a full frame and return the screen contents row by row
    fn draw(app: &App) -> Vec<String> {
        let backend = TestBackend::new(100, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect::<Vec<_>>()
            .chunks(width)
            .map(|row| row.concat())
            .collect()
    }

    fn tunnel(name: &str, status: TunnelStatus, cpu: Option<f64>, memory: Option<f64>) -> Tunnel {
        Tunnel {
            name: name.to_string(),
            domain: format!("{}.example.com", name),
            port: 3000,
            status,
            cpu,
            memory,
        }
    }

    fn record(name: &str, proxied: bool) -> DnsRecord {
        DnsRecord {
            id: "abc123".to_string(),
            name: name.to_string(),
            record_type: "A".to_string(),
            content: "1.2.3.4".to_string(),
            proxied,
        }
    }

    #[test]
    fn test_empty_tunnel_table_renders_empty_state() {
        let app = test_app();
        let screen = draw(&app).join("\n");
        assert!(screen.contains("No tunnels found"));
        // The message replaces the table outright: no header, no rows
        assert!(!screen.contains("DOMAIN"));
        assert!(!screen.contains("STATUS"));
        assert!(!screen.contains("●"));
        assert!(!screen.contains("○"));
    }

    #[test]
    fn test_empty_dns_table_renders_empty_state() {
        let mut app = test_app();
        app.tab = Tab::Dns;
        let screen = draw(&app).join("\n");
        assert!(screen.contains("No DNS records found"));
        assert!(!screen.contains("TYPE"));
        assert!(!screen.contains("CONTENT"));
        assert!(!screen.contains("PROXIED"));
    }

    #[test]
    fn test_tunnel_rows_render_status_and_metrics() {
        let mut app = test_app();
        app.tunnels = vec![
            tunnel("api", TunnelStatus::Running, Some(0.0), Some(128.0)),
            tunnel("blog", TunnelStatus::Stopped, None, None),
        ];
        let screen = draw(&app).join("\n");
        assert!(screen.contains("api.example.com"));
        assert!(screen.contains("RUNNING"));
        // Zero load on a running tunnel is a measurement, not N/A
        assert!(screen.contains("0.0%"));
        assert!(screen.contains("128.0MB"));
        assert!(screen.contains("STOPPED"));
        assert!(screen.contains("N/A"));
    }

    #[test]
    fn test_dns_rows_render_proxy_labels() {
        let mut app = test_app();
        app.tab = Tab::Dns;
        app.dns_records = vec![
            record("app.example.com", true),
            record("www.example.com", false),
        ];
        let rows = draw(&app);

        let proxied_row = rows
            .iter()
            .find(|row| row.contains("app.example.com"))
            .unwrap();
        assert!(proxied_row.contains("1.2.3.4"));
        assert!(proxied_row.contains("ON"));

        let plain_row = rows
            .iter()
            .find(|row| row.contains("www.example.com"))
            .unwrap();
        assert!(plain_row.contains("OFF"));
    }
}

use anyhow::Result;
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::{Duration, Instant};

use crate::api::{
    ApiClient, ApiError, CreateDnsRecordRequest, CreateTunnelRequest, DnsRecord, Tunnel,
    UpdateDnsRecordRequest,
};
use crate::config;
use crate::format;

use super::ui;

// Choices offered by the record-type and proxy selectors
pub const DNS_RECORD_TYPES: [&str; 4] = ["A", "AAAA", "CNAME", "TXT"];
pub const PROXY_CHOICES: [&str; 2] = ["OFF", "ON"];

// Which resource table is in view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Tunnels,
    Dns,
}

// Input mode for the TUI. Multi-field dialogs advance through one mode per
// step; Esc cancels the whole dialog from any step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    TunnelAddName,
    TunnelAddPort,
    DnsAddName,
    DnsAddType,
    DnsAddContent,
    DnsAddProxied,
    DnsEditType,
    DnsEditContent,
    DnsEditProxied,
    PasswordCurrent,
    PasswordNew,
    Confirm,
    Help,
}

impl InputMode {
    // Modes where typed or pasted text lands in the input buffer
    pub fn wants_text(&self) -> bool {
        matches!(
            self,
            InputMode::TunnelAddName
                | InputMode::TunnelAddPort
                | InputMode::DnsAddName
                | InputMode::DnsAddContent
                | InputMode::DnsEditContent
                | InputMode::PasswordCurrent
                | InputMode::PasswordNew
        )
    }
}

// Severity of a toast, selects its display color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
    Warning,
}

// Single-slot notification. Raising a new one replaces whatever is showing;
// a fast sequence is last-write-wins, not a queue.
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub raised_at: Instant,
}

impl Toast {
    // Delay before the toast appears
    pub const SHOW_DELAY: Duration = Duration::from_millis(100);
    // Total display window, measured from when the toast was raised
    pub const VISIBLE_FOR: Duration = Duration::from_millis(3000);

    pub fn visible(&self, now: Instant) -> bool {
        let age = now.duration_since(self.raised_at);
        age >= Self::SHOW_DELAY && age < Self::VISIBLE_FOR
    }

    pub fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.raised_at) >= Self::VISIBLE_FOR
    }
}

// Actions that require confirmation
#[derive(Debug, Clone)]
pub enum PendingAction {
    DeleteTunnel(String),
    DeleteDnsRecord(String),
}

// Application state
pub struct App {
    pub client: ApiClient,
    // Current input mode
    pub input_mode: InputMode,
    // Which resource table is in view
    pub tab: Tab,
    // Latest tunnel snapshot from the server
    pub tunnels: Vec<Tunnel>,
    // Latest DNS record snapshot from the server
    pub dns_records: Vec<DnsRecord>,
    // Selected row per tab
    pub selected_tunnel: usize,
    pub selected_record: usize,
    // Input buffer for text dialog steps
    pub input: String,
    // Collected during the tunnel add flow; empty means the server picks a name
    pub new_tunnel_subdomain: Option<String>,
    // Collected during the DNS add/edit flows
    pub new_record_name: Option<String>,
    pub new_record_type: Option<String>,
    pub new_record_content: Option<String>,
    // Selector index for the type and proxy steps
    pub choice_selected: usize,
    // Id of the record being edited
    pub editing_record: Option<String>,
    // Collected during the change-password flow
    pub old_password: Option<String>,
    // Confirmation message
    pub confirm_message: Option<String>,
    // Action to perform on confirmation
    pub pending_action: Option<PendingAction>,
    // Single-slot notification
    pub toast: Option<Toast>,
    // Deadline after which the app quits (set by logout)
    pub quit_at: Option<Instant>,
    // Should quit
    pub should_quit: bool,
}

impl App {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            input_mode: InputMode::Normal,
            tab: Tab::Tunnels,
            tunnels: Vec::new(),
            dns_records: Vec::new(),
            selected_tunnel: 0,
            selected_record: 0,
            input: String::new(),
            new_tunnel_subdomain: None,
            new_record_name: None,
            new_record_type: None,
            new_record_content: None,
            choice_selected: 0,
            editing_record: None,
            old_password: None,
            confirm_message: None,
            pending_action: None,
            toast: None,
            quit_at: None,
            should_quit: false,
        }
    }

    // Replace whatever toast is showing
    pub fn notify(&mut self, message: String, level: ToastLevel) {
        self.toast = Some(Toast {
            message,
            level,
            raised_at: Instant::now(),
        });
    }

    pub fn next_tab(&mut self) {
        self.tab = match self.tab {
            Tab::Tunnels => Tab::Dns,
            Tab::Dns => Tab::Tunnels,
        };
    }

    // Move selection up in the visible table
    pub fn select_previous(&mut self) {
        match self.tab {
            Tab::Tunnels => {
                if self.selected_tunnel > 0 {
                    self.selected_tunnel -= 1;
                }
            }
            Tab::Dns => {
                if self.selected_record > 0 {
                    self.selected_record -= 1;
                }
            }
        }
    }

    // Move selection down in the visible table
    pub fn select_next(&mut self) {
        match self.tab {
            Tab::Tunnels => {
                if !self.tunnels.is_empty() && self.selected_tunnel < self.tunnels.len() - 1 {
                    self.selected_tunnel += 1;
                }
            }
            Tab::Dns => {
                if !self.dns_records.is_empty() && self.selected_record < self.dns_records.len() - 1
                {
                    self.selected_record += 1;
                }
            }
        }
    }

    fn apply_tunnels(&mut self, result: Result<Vec<Tunnel>, ApiError>) {
        match result {
            Ok(tunnels) => {
                self.tunnels = tunnels;
                if self.selected_tunnel >= self.tunnels.len() && !self.tunnels.is_empty() {
                    self.selected_tunnel = self.tunnels.len() - 1;
                }
            }
            // A failed fetch keeps the previous table on screen
            Err(e) => self.notify(e.to_string(), ToastLevel::Error),
        }
    }

    fn apply_dns_records(&mut self, result: Result<Vec<DnsRecord>, ApiError>) {
        match result {
            Ok(records) => {
                self.dns_records = records;
                if self.selected_record >= self.dns_records.len() && !self.dns_records.is_empty() {
                    self.selected_record = self.dns_records.len() - 1;
                }
            }
            Err(e) => self.notify(e.to_string(), ToastLevel::Error),
        }
    }

    pub async fn refresh_tunnels(&mut self) {
        let result = self.client.list_tunnels().await;
        self.apply_tunnels(result);
    }

    pub async fn refresh_dns_records(&mut self) {
        let result = self.client.list_dns_records().await;
        self.apply_dns_records(result);
    }

    // Populate both tables at startup, without the confirmation toast
    pub async fn load_all(&mut self) {
        let (dns, tunnels) = tokio::join!(self.client.list_dns_records(), self.client.list_tunnels());
        self.apply_dns_records(dns);
        self.apply_tunnels(tunnels);
    }

    // User-requested refresh: the confirmation fires when the refresh is
    // kicked off, not when both fetches land
    pub async fn refresh_all(&mut self) {
        self.notify("Data refreshed".to_string(), ToastLevel::Success);
        let (dns, tunnels) = tokio::join!(self.client.list_dns_records(), self.client.list_tunnels());
        self.apply_dns_records(dns);
        self.apply_tunnels(tunnels);
    }

    // Start the add-tunnel dialog
    pub fn start_add_tunnel(&mut self) {
        self.input_mode = InputMode::TunnelAddName;
        self.input.clear();
        self.new_tunnel_subdomain = None;
    }

    // Start the add-record dialog
    pub fn start_add_record(&mut self) {
        self.input_mode = InputMode::DnsAddName;
        self.input.clear();
        self.new_record_name = None;
        self.new_record_type = None;
        self.new_record_content = None;
        self.choice_selected = 0;
    }

    // Start the edit dialog, prefilled from the rendered row
    pub fn start_edit_record(&mut self) {
        if let Some(record) = self.dns_records.get(self.selected_record) {
            self.editing_record = Some(record.id.clone());
            self.new_record_type = None;
            self.new_record_content = None;
            self.choice_selected = DNS_RECORD_TYPES
                .iter()
                .position(|t| *t == record.record_type)
                .unwrap_or(0);
            self.input.clear();
            self.input_mode = InputMode::DnsEditType;
        }
    }

    pub fn start_change_password(&mut self) {
        self.input_mode = InputMode::PasswordCurrent;
        self.input.clear();
        self.old_password = None;
    }

    // Cancel whatever dialog is open, from any step
    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input.clear();
        self.new_tunnel_subdomain = None;
        self.new_record_name = None;
        self.new_record_type = None;
        self.new_record_content = None;
        self.editing_record = None;
        self.old_password = None;
        self.choice_selected = 0;
        self.confirm_message = None;
        self.pending_action = None;
    }

    // Advance a text step to the next dialog step
    pub fn next_step(&mut self) {
        match self.input_mode {
            InputMode::TunnelAddName => {
                // Empty is allowed: the server generates a name
                self.new_tunnel_subdomain = Some(self.input.clone());
                self.input.clear();
                self.input_mode = InputMode::TunnelAddPort;
            }
            InputMode::DnsAddName => {
                if !self.input.is_empty() {
                    self.new_record_name = Some(self.input.clone());
                    self.input.clear();
                    self.choice_selected = 0;
                    self.input_mode = InputMode::DnsAddType;
                }
            }
            InputMode::DnsAddContent => {
                if !self.input.is_empty() {
                    self.new_record_content = Some(self.input.clone());
                    self.input.clear();
                    self.choice_selected = 0;
                    self.input_mode = InputMode::DnsAddProxied;
                }
            }
            InputMode::DnsEditContent => {
                if !self.input.is_empty() {
                    self.new_record_content = Some(self.input.clone());
                    self.input.clear();
                    self.choice_selected = self
                        .dns_records
                        .get(self.selected_record)
                        .map(|r| if r.proxied { 1 } else { 0 })
                        .unwrap_or(0);
                    self.input_mode = InputMode::DnsEditProxied;
                }
            }
            InputMode::PasswordCurrent => {
                if !self.input.is_empty() {
                    self.old_password = Some(self.input.clone());
                    self.input.clear();
                    self.input_mode = InputMode::PasswordNew;
                }
            }
            _ => {}
        }
    }

    fn choice_count(&self) -> usize {
        match self.input_mode {
            InputMode::DnsAddType | InputMode::DnsEditType => DNS_RECORD_TYPES.len(),
            InputMode::DnsAddProxied | InputMode::DnsEditProxied => PROXY_CHOICES.len(),
            _ => 0,
        }
    }

    pub fn select_choice_next(&mut self) {
        let count = self.choice_count();
        if count > 0 && self.choice_selected < count - 1 {
            self.choice_selected += 1;
        }
    }

    pub fn select_choice_prev(&mut self) {
        if self.choice_selected > 0 {
            self.choice_selected -= 1;
        }
    }

    // Enter on the record-type selector
    pub fn confirm_type_choice(&mut self) {
        self.new_record_type = Some(DNS_RECORD_TYPES[self.choice_selected].to_string());
        match self.input_mode {
            InputMode::DnsAddType => {
                self.input.clear();
                self.input_mode = InputMode::DnsAddContent;
            }
            InputMode::DnsEditType => {
                // Prefill from the rendered row, not a fresh fetch
                self.input = self
                    .dns_records
                    .get(self.selected_record)
                    .map(|r| r.content.clone())
                    .unwrap_or_default();
                self.input_mode = InputMode::DnsEditContent;
            }
            _ => {}
        }
    }

    // Enter on the proxy selector of the add flow. Fields are cloned, not
    // taken, so a rejected submit leaves the dialog intact for another try.
    pub async fn submit_create_record(&mut self) -> Result<()> {
        let req = CreateDnsRecordRequest {
            subdomain: self.new_record_name.clone().unwrap_or_default(),
            record_type: self.new_record_type.clone().unwrap_or_default(),
            target: self.new_record_content.clone().unwrap_or_default(),
            proxied: self.choice_selected == 1,
        };
        self.client.create_dns_record(&req).await?;
        self.cancel_input();
        self.notify(
            "DNS record created successfully".to_string(),
            ToastLevel::Success,
        );
        self.refresh_dns_records().await;
        Ok(())
    }

    // Enter on the proxy selector of the edit flow
    pub async fn submit_update_record(&mut self) -> Result<()> {
        if let Some(id) = self.editing_record.clone() {
            let req = UpdateDnsRecordRequest {
                record_type: self.new_record_type.clone().unwrap_or_default(),
                content: self.new_record_content.clone().unwrap_or_default(),
                proxied: self.choice_selected == 1,
            };
            self.client.update_dns_record(&id, &req).await?;
            self.cancel_input();
            self.notify(
                "DNS record updated successfully".to_string(),
                ToastLevel::Success,
            );
            self.refresh_dns_records().await;
        }
        Ok(())
    }

    // Enter on the port step. The port must parse before anything is sent.
    pub async fn submit_create_tunnel(&mut self) -> Result<()> {
        if self.input.is_empty() {
            return Ok(());
        }
        let port = match format::parse_port(&self.input) {
            Some(port) => port,
            None => {
                self.notify(format!("Invalid port '{}'", self.input), ToastLevel::Error);
                return Ok(());
            }
        };
        let req = CreateTunnelRequest {
            subdomain: self.new_tunnel_subdomain.clone().unwrap_or_default(),
            port,
        };
        let created = self.client.create_tunnel(&req).await?;
        self.cancel_input();
        self.notify(created.message, ToastLevel::Success);
        self.refresh_tunnels().await;
        Ok(())
    }

    // Enter on the new-password step
    pub async fn submit_change_password(&mut self) -> Result<()> {
        if self.input.is_empty() {
            return Ok(());
        }
        let old = self.old_password.clone().unwrap_or_default();
        self.client.change_password(&old, &self.input).await?;
        self.cancel_input();
        self.notify(
            "Password changed successfully".to_string(),
            ToastLevel::Success,
        );
        Ok(())
    }

    // Always issues the call: the displayed status may be stale, and the
    // re-fetch afterwards is what settles the truth
    pub async fn start_selected(&mut self) -> Result<()> {
        if let Some(tunnel) = self.tunnels.get(self.selected_tunnel) {
            let name = tunnel.name.clone();
            self.client.start_tunnel(&name).await?;
            self.notify("Tunnel started".to_string(), ToastLevel::Success);
            self.refresh_tunnels().await;
        }
        Ok(())
    }

    pub async fn stop_selected(&mut self) -> Result<()> {
        if let Some(tunnel) = self.tunnels.get(self.selected_tunnel) {
            let name = tunnel.name.clone();
            self.client.stop_tunnel(&name).await?;
            self.notify("Tunnel stopped".to_string(), ToastLevel::Success);
            self.refresh_tunnels().await;
        }
        Ok(())
    }

    // Ask before deleting, naming the resource. Declining is a silent no-op.
    pub fn request_delete(&mut self) {
        match self.tab {
            Tab::Tunnels => {
                if let Some(tunnel) = self.tunnels.get(self.selected_tunnel) {
                    self.confirm_message = Some(format!(
                        "Delete tunnel '{}'? This will also stop it if running. (y/n)",
                        tunnel.name
                    ));
                    self.pending_action = Some(PendingAction::DeleteTunnel(tunnel.name.clone()));
                    self.input_mode = InputMode::Confirm;
                }
            }
            Tab::Dns => {
                if let Some(record) = self.dns_records.get(self.selected_record) {
                    self.confirm_message =
                        Some(format!("Delete DNS record '{}'? (y/n)", record.name));
                    self.pending_action =
                        Some(PendingAction::DeleteDnsRecord(record.id.clone()));
                    self.input_mode = InputMode::Confirm;
                }
            }
        }
    }

    // Execute a confirmed destructive action
    pub async fn execute_pending(&mut self, action: PendingAction) -> Result<()> {
        match action {
            PendingAction::DeleteTunnel(name) => {
                self.client.delete_tunnel(&name).await?;
                self.notify("Tunnel deleted".to_string(), ToastLevel::Success);
                self.refresh_tunnels().await;
            }
            PendingAction::DeleteDnsRecord(id) => {
                self.client.delete_dns_record(&id).await?;
                self.notify("DNS record deleted".to_string(), ToastLevel::Success);
                self.refresh_dns_records().await;
            }
        }
        Ok(())
    }

    // Clears the server session, then quits once the toast has had a moment
    pub async fn logout(&mut self) {
        self.notify("Logging out...".to_string(), ToastLevel::Warning);
        // The quit deadline tracks the toast, not the request round-trip
        self.quit_at = Some(Instant::now() + Duration::from_secs(1));
        self.client.logout().await.ok();
    }
}

// Run the TUI application
pub async fn run_tui(server_override: Option<&str>) -> Result<()> {
    let config = config::resolve_config(server_override)?;
    let client = ApiClient::new(&config.server_url, config.timeout())?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app and fetch the initial snapshots
    let mut app = App::new(client);
    app.load_all().await;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        let now = Instant::now();
        // Drop the toast once its display window has passed
        if app.toast.as_ref().map(|t| t.expired(now)).unwrap_or(false) {
            app.toast = None;
        }
        if app.quit_at.map(|at| now >= at).unwrap_or(false) {
            app.should_quit = true;
        }

        // Poll with a timeout so toast expiry and the logout countdown tick
        if event::poll(Duration::from_millis(250))? {
            let event = event::read()?;

            // Handle paste events (some remote desktop software sends text as paste)
            if let Event::Paste(text) = &event {
                if app.input_mode.wants_text() {
                    app.input.push_str(text);
                }
                continue;
            }

            if let Event::Key(key) = event {
                // Skip release events
                if key.kind == KeyEventKind::Release {
                    continue;
                }

                match app.input_mode {
                    InputMode::Normal => match key.code {
                        KeyCode::Char('q') => {
                            app.should_quit = true;
                        }
                        KeyCode::Tab => {
                            app.next_tab();
                        }
                        KeyCode::Char('a') => match app.tab {
                            Tab::Tunnels => app.start_add_tunnel(),
                            Tab::Dns => app.start_add_record(),
                        },
                        KeyCode::Char('e') => {
                            if app.tab == Tab::Dns {
                                app.start_edit_record();
                            }
                        }
                        KeyCode::Char('s') => {
                            if app.tab == Tab::Tunnels {
                                if let Err(e) = app.start_selected().await {
                                    app.notify(e.to_string(), ToastLevel::Error);
                                }
                            }
                        }
                        KeyCode::Char('S') => {
                            if app.tab == Tab::Tunnels {
                                if let Err(e) = app.stop_selected().await {
                                    app.notify(e.to_string(), ToastLevel::Error);
                                }
                            }
                        }
                        KeyCode::Char('d') => {
                            app.request_delete();
                        }
                        KeyCode::Char('r') => {
                            app.refresh_all().await;
                        }
                        KeyCode::Char('p') => {
                            app.start_change_password();
                        }
                        KeyCode::Char('L') => {
                            app.logout().await;
                        }
                        KeyCode::Char('?') => {
                            app.input_mode = InputMode::Help;
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.select_previous();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.select_next();
                        }
                        _ => {}
                    },
                    InputMode::Help => match key.code {
                        KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') | KeyCode::Enter => {
                            app.input_mode = InputMode::Normal;
                        }
                        _ => {}
                    },
                    InputMode::TunnelAddName
                    | InputMode::DnsAddName
                    | InputMode::DnsAddContent
                    | InputMode::DnsEditContent
                    | InputMode::PasswordCurrent => match key.code {
                        KeyCode::Esc => {
                            app.cancel_input();
                        }
                        KeyCode::Enter => {
                            app.next_step();
                        }
                        KeyCode::Backspace => {
                            app.input.pop();
                        }
                        KeyCode::Char(c) => {
                            app.input.push(c);
                        }
                        _ => {}
                    },
                    InputMode::TunnelAddPort => match key.code {
                        KeyCode::Esc => {
                            app.cancel_input();
                        }
                        KeyCode::Enter => {
                            if let Err(e) = app.submit_create_tunnel().await {
                                app.notify(e.to_string(), ToastLevel::Error);
                            }
                        }
                        KeyCode::Backspace => {
                            app.input.pop();
                        }
                        KeyCode::Char(c) => {
                            app.input.push(c);
                        }
                        _ => {}
                    },
                    InputMode::PasswordNew => match key.code {
                        KeyCode::Esc => {
                            app.cancel_input();
                        }
                        KeyCode::Enter => {
                            if let Err(e) = app.submit_change_password().await {
                                app.notify(e.to_string(), ToastLevel::Error);
                            }
                        }
                        KeyCode::Backspace => {
                            app.input.pop();
                        }
                        KeyCode::Char(c) => {
                            app.input.push(c);
                        }
                        _ => {}
                    },
                    InputMode::DnsAddType | InputMode::DnsEditType => match key.code {
                        KeyCode::Esc => {
                            app.cancel_input();
                        }
                        KeyCode::Enter => {
                            app.confirm_type_choice();
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.select_choice_prev();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.select_choice_next();
                        }
                        _ => {}
                    },
                    InputMode::DnsAddProxied => match key.code {
                        KeyCode::Esc => {
                            app.cancel_input();
                        }
                        KeyCode::Enter => {
                            if let Err(e) = app.submit_create_record().await {
                                app.notify(e.to_string(), ToastLevel::Error);
                            }
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.select_choice_prev();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.select_choice_next();
                        }
                        _ => {}
                    },
                    InputMode::DnsEditProxied => match key.code {
                        KeyCode::Esc => {
                            app.cancel_input();
                        }
                        KeyCode::Enter => {
                            if let Err(e) = app.submit_update_record().await {
                                app.notify(e.to_string(), ToastLevel::Error);
                            }
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.select_choice_prev();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            app.select_choice_next();
                        }
                        _ => {}
                    },
                    InputMode::Confirm => match key.code {
                        KeyCode::Char('y') | KeyCode::Char('Y') => {
                            if let Some(action) = app.pending_action.take() {
                                app.confirm_message = None;
                                app.input_mode = InputMode::Normal;
                                if let Err(e) = app.execute_pending(action).await {
                                    app.notify(e.to_string(), ToastLevel::Error);
                                }
                            }
                        }
                        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                            app.cancel_input();
                        }
                        _ => {}
                    },
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TunnelStatus;

    fn test_app() -> App {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        App::new(client)
    }

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

    fn record(id: &str, name: &str) -> DnsRecord {
        DnsRecord {
            id: id.to_string(),
            name: name.to_string(),
            record_type: "CNAME".to_string(),
            content: "origin.example.com".to_string(),
            proxied: true,
        }
    }

    #[test]
    fn test_toast_visibility_window() {
        let raised = Instant::now();
        let toast = Toast {
            message: "Data refreshed".to_string(),
            level: ToastLevel::Success,
            raised_at: raised,
        };
        assert!(!toast.visible(raised));
        assert!(toast.visible(raised + Duration::from_millis(100)));
        assert!(toast.visible(raised + Duration::from_millis(2999)));
        assert!(!toast.visible(raised + Duration::from_millis(3000)));
        assert!(toast.expired(raised + Duration::from_millis(3000)));
        assert!(!toast.expired(raised + Duration::from_millis(2999)));
    }

    #[test]
    fn test_notify_replaces_toast() {
        let mut app = test_app();
        app.notify("first".to_string(), ToastLevel::Success);
        app.notify("second".to_string(), ToastLevel::Error);
        let toast = app.toast.as_ref().unwrap();
        assert_eq!(toast.message, "second");
        assert_eq!(toast.level, ToastLevel::Error);
    }

    #[test]
    fn test_cancel_input_clears_every_dialog_field() {
        let mut app = test_app();
        app.input_mode = InputMode::DnsAddProxied;
        app.input = "1.2.3.4".to_string();
        app.new_record_name = Some("test".to_string());
        app.new_record_type = Some("A".to_string());
        app.new_record_content = Some("1.2.3.4".to_string());
        app.new_tunnel_subdomain = Some("api".to_string());
        app.editing_record = Some("abc123".to_string());
        app.old_password = Some("hunter2".to_string());
        app.choice_selected = 1;
        app.confirm_message = Some("Delete?".to_string());
        app.pending_action = Some(PendingAction::DeleteTunnel("api".to_string()));

        app.cancel_input();

        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.input.is_empty());
        assert!(app.new_record_name.is_none());
        assert!(app.new_record_type.is_none());
        assert!(app.new_record_content.is_none());
        assert!(app.new_tunnel_subdomain.is_none());
        assert!(app.editing_record.is_none());
        assert!(app.old_password.is_none());
        assert_eq!(app.choice_selected, 0);
        assert!(app.confirm_message.is_none());
        assert!(app.pending_action.is_none());
    }

    #[test]
    fn test_declined_delete_is_a_silent_no_op() {
        let mut app = test_app();
        app.tunnels = vec![tunnel("api", TunnelStatus::Running)];
        app.request_delete();
        assert_eq!(app.input_mode, InputMode::Confirm);
        assert!(app.confirm_message.as_ref().unwrap().contains("api"));
        assert!(app.pending_action.is_some());

        // Declining clears the pending action without touching the row
        app.cancel_input();
        assert!(app.pending_action.is_none());
        assert_eq!(app.tunnels.len(), 1);
        assert_eq!(app.tunnels[0].status, TunnelStatus::Running);
    }

    #[test]
    fn test_delete_confirmation_names_the_record() {
        let mut app = test_app();
        app.tab = Tab::Dns;
        app.dns_records = vec![record("abc123", "test.example.com")];
        app.request_delete();
        assert!(app
            .confirm_message
            .as_ref()
            .unwrap()
            .contains("test.example.com"));
        assert!(matches!(
            app.pending_action,
            Some(PendingAction::DeleteDnsRecord(ref id)) if id == "abc123"
        ));
    }

    #[test]
    fn test_failed_fetch_keeps_stale_table() {
        let mut app = test_app();
        app.tunnels = vec![tunnel("api", TunnelStatus::Running)];
        app.apply_tunnels(Err(ApiError::Rejected(
            "Failed to fetch tunnels".to_string(),
        )));
        assert_eq!(app.tunnels.len(), 1);
        assert_eq!(app.tunnels[0].name, "api");
        let toast = app.toast.as_ref().unwrap();
        assert_eq!(toast.message, "Failed to fetch tunnels");
        assert_eq!(toast.level, ToastLevel::Error);
    }

    #[test]
    fn test_fetch_replaces_with_server_snapshot() {
        let mut app = test_app();
        app.apply_tunnels(Ok(vec![tunnel("api", TunnelStatus::Stopped)]));
        assert_eq!(app.tunnels[0].status, TunnelStatus::Stopped);

        // The next snapshot wins outright, no local patching
        app.apply_tunnels(Ok(vec![tunnel("api", TunnelStatus::Running)]));
        assert_eq!(app.tunnels.len(), 1);
        assert_eq!(app.tunnels[0].status, TunnelStatus::Running);
    }

    #[test]
    fn test_fetch_clamps_selection() {
        let mut app = test_app();
        app.apply_tunnels(Ok(vec![
            tunnel("a", TunnelStatus::Running),
            tunnel("b", TunnelStatus::Stopped),
            tunnel("c", TunnelStatus::Stopped),
        ]));
        app.selected_tunnel = 2;
        app.apply_tunnels(Ok(vec![tunnel("a", TunnelStatus::Running)]));
        assert_eq!(app.selected_tunnel, 0);
    }

    #[tokio::test]
    async fn test_invalid_port_never_submits() {
        let mut app = test_app();
        app.start_add_tunnel();
        app.next_step();
        assert_eq!(app.input_mode, InputMode::TunnelAddPort);

        app.input = "abc".to_string();
        app.submit_create_tunnel().await.unwrap();

        // No request went out: the dialog is still open and the toast says why
        assert_eq!(app.input_mode, InputMode::TunnelAddPort);
        assert!(app.toast.as_ref().unwrap().message.contains("Invalid port"));
        assert_eq!(app.toast.as_ref().unwrap().level, ToastLevel::Error);
    }

    #[test]
    fn test_tunnel_name_step_allows_empty() {
        let mut app = test_app();
        app.start_add_tunnel();
        app.next_step();
        assert_eq!(app.input_mode, InputMode::TunnelAddPort);
        assert_eq!(app.new_tunnel_subdomain.as_deref(), Some(""));
    }

    #[test]
    fn test_dns_add_steps_require_input() {
        let mut app = test_app();
        app.start_add_record();
        app.next_step();
        assert_eq!(app.input_mode, InputMode::DnsAddName);

        app.input = "test".to_string();
        app.next_step();
        assert_eq!(app.input_mode, InputMode::DnsAddType);
        assert_eq!(app.new_record_name.as_deref(), Some("test"));
    }

    #[test]
    fn test_edit_prefills_from_rendered_row() {
        let mut app = test_app();
        app.tab = Tab::Dns;
        app.dns_records = vec![record("abc123", "blog.example.com")];
        app.start_edit_record();

        assert_eq!(app.input_mode, InputMode::DnsEditType);
        assert_eq!(app.editing_record.as_deref(), Some("abc123"));
        // CNAME sits at index 2 of the type choices
        assert_eq!(app.choice_selected, 2);

        app.confirm_type_choice();
        assert_eq!(app.input_mode, InputMode::DnsEditContent);
        assert_eq!(app.input, "origin.example.com");

        app.next_step();
        assert_eq!(app.input_mode, InputMode::DnsEditProxied);
        assert_eq!(app.choice_selected, 1);
    }

    #[test]
    fn test_next_tab_cycles() {
        let mut app = test_app();
        assert_eq!(app.tab, Tab::Tunnels);
        app.next_tab();
        assert_eq!(app.tab, Tab::Dns);
        app.next_tab();
        assert_eq!(app.tab, Tab::Tunnels);
    }

    #[test]
    fn test_choice_selection_clamps_to_list() {
        let mut app = test_app();
        app.input_mode = InputMode::DnsAddType;
        for _ in 0..10 {
            app.select_choice_next();
        }
        assert_eq!(app.choice_selected, DNS_RECORD_TYPES.len() - 1);
        for _ in 0..10 {
            app.select_choice_prev();
        }
        assert_eq!(app.choice_selected, 0);
    }

    #[tokio::test]
    async fn test_logout_quit_deadline_tracks_the_toast() {
        // A non-routable address, so the request stalls until the timeout
        let client =
            ApiClient::new("http://10.255.255.1:9", Duration::from_millis(250)).unwrap();
        let mut app = App::new(client);
        app.logout().await;

        let toast = app.toast.as_ref().unwrap();
        assert_eq!(toast.message, "Logging out...");
        assert_eq!(toast.level, ToastLevel::Warning);

        // The deadline was armed with the toast, not after the request settled
        let quit_at = app.quit_at.unwrap();
        assert!(quit_at >= toast.raised_at + Duration::from_millis(900));
        assert!(quit_at <= toast.raised_at + Duration::from_millis(1100));
    }
}

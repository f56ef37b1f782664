mod api;
mod cli;
mod config;
mod format;
mod tui;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands, DnsCommands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let server = cli.server.as_deref();

    match cli.command {
        None => {
            // Default: open TUI
            tui::run_tui(server).await?;
        }
        Some(Commands::Init) => {
            cmd_init(server).await?;
        }
        Some(Commands::List) => {
            cmd_list(server).await?;
        }
        Some(Commands::Add { args, start }) => {
            // Parse args: if 1 arg it's the port, if 2 args it's subdomain + port
            let (subdomain, port) = if args.len() == 2 {
                (args[0].clone(), args[1].clone())
            } else {
                (String::new(), args[0].clone())
            };
            cmd_add(subdomain, port, start, server).await?;
        }
        Some(Commands::Start { name }) => {
            cmd_start(name, server).await?;
        }
        Some(Commands::Stop { name }) => {
            cmd_stop(name, server).await?;
        }
        Some(Commands::Delete { name, yes }) => {
            cmd_delete(name, yes, server).await?;
        }
        Some(Commands::Status { name }) => {
            cmd_status(name, server).await?;
        }
        Some(Commands::Dns { command }) => match command {
            None => cmd_dns_list(server).await?,
            Some(DnsCommands::List) => cmd_dns_list(server).await?,
            Some(DnsCommands::Add {
                subdomain,
                record_type,
                target,
                proxied,
            }) => {
                cmd_dns_add(subdomain, record_type, target, proxied, server).await?;
            }
            Some(DnsCommands::Rm { id, yes }) => {
                cmd_dns_rm(id, yes, server).await?;
            }
        },
        Some(Commands::Passwd) => {
            cmd_passwd(server).await?;
        }
    }

    Ok(())
}

// Client for the configured server, honoring a --server override
fn client_for(server: Option<&str>) -> Result<api::ApiClient> {
    let cfg = config::resolve_config(server)?;
    api::ApiClient::new(&cfg.server_url, cfg.timeout())
}

fn prompt(label: &str) -> Result<String> {
    println!("{}", label);
    print!("> ");
    std::io::Write::flush(&mut std::io::stdout())?;
    let mut value = String::new();
    std::io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

// y/yes accepts, anything else declines
fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(question)?.to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

async fn cmd_init(server: Option<&str>) -> Result<()> {
    // Check if already configured
    if config::config_path()?.exists() {
        let cfg = config::load_config()?;
        println!("tundeck is already configured for {}", cfg.server_url);
        println!();
        if !confirm("Reconfigure with a new server? [y/N]")? {
            println!("Cancelled.");
            return Ok(());
        }
        println!();
    }

    let server_url = match server {
        Some(url) => url.trim().to_string(),
        None => prompt("Enter the control server URL (e.g., http://tunnel.example.com:8080):")?,
    };

    if server_url.is_empty() {
        bail!("Server URL cannot be empty");
    }

    let cfg = config::Config::new(server_url);

    // Verify the server answers before saving anything
    println!("\nChecking the server...");
    let client = api::ApiClient::new(&cfg.server_url, cfg.timeout())?;
    let status = client
        .system_status()
        .await
        .with_context(|| format!("Could not reach {}", cfg.server_url))?;
    println!("✓ Server is {} (up {})", status.status, status.uptime);

    config::save_config(&cfg)?;
    println!("✓ Config saved to {}", config::config_path()?.display());

    println!("\nYou're ready! Try:");
    println!("  tundeck                      # open the dashboard");
    println!("  tundeck add myapp 3000       # expose port 3000 at myapp.<domain>");
    println!("  tundeck dns list             # list DNS records");

    Ok(())
}

async fn cmd_list(server: Option<&str>) -> Result<()> {
    let client = client_for(server)?;
    let tunnels = client.list_tunnels().await?;

    if tunnels.is_empty() {
        println!("No tunnels found.");
        println!("Add one with: tundeck add <subdomain> <port>");
        return Ok(());
    }

    println!("Tunnels ({} running):", format::running_count(&tunnels));
    for tunnel in &tunnels {
        let status_text = match tunnel.status {
            api::TunnelStatus::Running => "running",
            api::TunnelStatus::Stopped => "stopped",
        };
        println!(
            "  {} {:<20} {} -> port {} ({})",
            tunnel.status.symbol(),
            tunnel.name,
            tunnel.domain,
            tunnel.port,
            status_text
        );
    }

    Ok(())
}

// Create a tunnel; with an empty subdomain the server picks the name
async fn cmd_add(
    subdomain: String,
    port_arg: String,
    start: bool,
    server: Option<&str>,
) -> Result<()> {
    let port = match format::parse_port(&port_arg) {
        Some(port) => port,
        None => bail!("Invalid port '{}'", port_arg),
    };

    let client = client_for(server)?;

    println!("Creating tunnel...");
    let created = client
        .create_tunnel(&api::CreateTunnelRequest {
            subdomain: subdomain.clone(),
            port,
        })
        .await?;
    println!("✓ {}", created.message);

    let name = created.name.unwrap_or(subdomain);
    if start {
        if name.is_empty() {
            bail!("The server did not echo the tunnel name. Find it with `tundeck list` and start it from there.");
        }
        client.start_tunnel(&name).await?;
        println!("✓ Started tunnel: {}", name);
    } else if !name.is_empty() {
        println!("\nTunnel added. Start with: tundeck start {}", name);
    }

    Ok(())
}

async fn cmd_start(name: String, server: Option<&str>) -> Result<()> {
    let client = client_for(server)?;
    client.start_tunnel(&name).await?;
    println!("✓ Started tunnel: {}", name);

    if let Ok(tunnel) = client.tunnel_status(&name).await {
        println!("  https://{}", tunnel.domain);
    }

    Ok(())
}

async fn cmd_stop(name: String, server: Option<&str>) -> Result<()> {
    let client = client_for(server)?;
    client.stop_tunnel(&name).await?;
    println!("✓ Stopped tunnel: {}", name);
    Ok(())
}

async fn cmd_delete(name: String, skip_confirm: bool, server: Option<&str>) -> Result<()> {
    if !skip_confirm {
        let question = format!(
            "Delete tunnel '{}'? This will also stop it if running. [y/N]",
            name
        );
        if !confirm(&question)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let client = client_for(server)?;
    client.delete_tunnel(&name).await?;
    println!("✓ Deleted tunnel: {}", name);
    Ok(())
}

async fn cmd_status(name: Option<String>, server: Option<&str>) -> Result<()> {
    let client = client_for(server)?;

    match name {
        Some(name) => {
            let tunnel = client.tunnel_status(&name).await?;
            let status_text = match tunnel.status {
                api::TunnelStatus::Running => "running",
                api::TunnelStatus::Stopped => "stopped",
            };
            println!(
                "{} {} ({})",
                tunnel.status.symbol(),
                tunnel.name,
                status_text
            );
            println!("  Domain: {}", tunnel.domain);
            println!("  Port:   {}", tunnel.port);
            println!("  CPU:    {}", format::format_cpu(tunnel.cpu));
            println!("  Memory: {}", format::format_memory(tunnel.memory));
        }
        None => {
            let status = client.system_status().await?;
            println!("Server: {}", status.status);
            println!("Uptime: {}", status.uptime);
        }
    }

    Ok(())
}

async fn cmd_dns_list(server: Option<&str>) -> Result<()> {
    let client = client_for(server)?;
    let records = client.list_dns_records().await?;

    if records.is_empty() {
        println!("No DNS records found.");
        println!("Add one with: tundeck dns add <subdomain> <type> <target>");
        return Ok(());
    }

    println!("DNS records:");
    for record in &records {
        println!(
            "  {:<28} {:<6} {:<30} {:<3}  {}",
            record.name,
            record.record_type,
            record.content,
            format::proxied_label(record.proxied),
            record.id
        );
    }

    Ok(())
}

async fn cmd_dns_add(
    subdomain: String,
    record_type: String,
    target: String,
    proxied: bool,
    server: Option<&str>,
) -> Result<()> {
    let client = client_for(server)?;

    let req = api::CreateDnsRecordRequest {
        subdomain,
        record_type: record_type.to_uppercase(),
        target,
        proxied,
    };
    client.create_dns_record(&req).await?;
    println!("✓ DNS record created");

    Ok(())
}

async fn cmd_dns_rm(id: String, skip_confirm: bool, server: Option<&str>) -> Result<()> {
    if !skip_confirm && !confirm(&format!("Delete DNS record {}? [y/N]", id))? {
        println!("Cancelled.");
        return Ok(());
    }

    let client = client_for(server)?;
    client.delete_dns_record(&id).await?;
    println!("✓ Deleted DNS record: {}", id);
    Ok(())
}

async fn cmd_passwd(server: Option<&str>) -> Result<()> {
    let client = client_for(server)?;

    let old = prompt("Enter current password:")?;
    if old.is_empty() {
        bail!("Password cannot be empty");
    }
    let new = prompt("Enter new password:")?;
    if new.is_empty() {
        bail!("Password cannot be empty");
    }

    client.change_password(&old, &new).await?;
    println!("✓ Password changed");

    Ok(())
}

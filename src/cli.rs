use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tundeck")]
#[command(about = "Terminal dashboard for a self-hosted tunnel and DNS control server", long_about = None)]
#[command(version)]
pub struct Cli {
    // Control server URL (overrides the configured server)
    #[arg(long, global = true)]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Point tundeck at a control server and save the config
    Init,

    // List all tunnels (for scripting)
    List,

    // Create a tunnel (non-interactive)
    //
    // Examples:
    //   tundeck add 3000                  # server-generated subdomain
    //   tundeck add myapp 3000            # myapp.<server domain> -> port 3000
    Add {
        // Subdomain and port. If one argument: port only (the server picks
        // a name). If two arguments: subdomain and port.
        #[arg(required = true, num_args = 1..=2)]
        args: Vec<String>,

        // Start the tunnel immediately after creating
        #[arg(short, long)]
        start: bool,
    },

    // Start a stopped tunnel
    Start {
        // Tunnel name
        name: String,
    },

    // Stop a running tunnel
    Stop {
        // Tunnel name
        name: String,
    },

    // Delete a tunnel (stops it first if running)
    Delete {
        // Tunnel name
        name: String,

        // Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    // Show one tunnel's status, or the server's status if no name is given
    Status {
        // Tunnel name
        name: Option<String>,
    },

    // Manage DNS records
    Dns {
        #[command(subcommand)]
        command: Option<DnsCommands>,
    },

    // Change the dashboard password
    Passwd,
}

#[derive(Subcommand)]
pub enum DnsCommands {
    // List all DNS records
    List,

    // Create a DNS record
    //
    // Examples:
    //   tundeck dns add test A 1.2.3.4
    //   tundeck dns add blog CNAME origin.example.com --proxied
    Add {
        // Subdomain for the record
        subdomain: String,

        // Record type (A, AAAA, CNAME, TXT)
        record_type: String,

        // Where the record points
        target: String,

        // Route the record through the proxy
        #[arg(short, long)]
        proxied: bool,
    },

    // Delete a DNS record by id
    Rm {
        // Record id (see `tundeck dns list`)
        id: String,

        // Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

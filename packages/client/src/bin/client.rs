//! Command-line driver for the session gateway.
//!
//! Every gateway route has a subcommand; responses are printed as pretty JSON.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin cohost-client -- create --host alice --max-guests 2
//! cargo run --bin cohost-client -- join ABCD-EFG --user bob --name Bob
//! cargo run --bin cohost-client -- approve <SESSION_ID> bob
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;

use cohost_client::{
    ClientError, GatewayClient, gateway::DEFAULT_GATEWAY_URL, join_with_retry,
    runner::MAX_JOIN_ATTEMPTS,
};
use cohost_server::infrastructure::dto::http::{
    CreateSessionRequest, GuestInfoDto, JoinRequest, OkResponse, SessionConfigDto,
};
use cohost_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "cohost-client")]
#[command(about = "Drive a Cohost collaboration session over HTTP", long_about = None)]
struct Args {
    /// Gateway base URL
    #[arg(short = 'u', long, env = "COHOST_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the gateway is up
    Health,
    /// Create a session for a host
    Create {
        #[arg(long)]
        host: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
        #[arg(long, default_value_t = 0)]
        max_guests: usize,
        /// read_only | read_write
        #[arg(long)]
        permission: Option<String>,
        /// shared | follow
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        allow_anonymous: bool,
        #[arg(long, default_value_t = 0)]
        code_ttl_minutes: u32,
        #[arg(long)]
        workspace: Option<String>,
    },
    /// Request to join with a code
    Join {
        code: String,
        #[arg(long, default_value = "")]
        user: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        avatar_url: Option<String>,
        /// Attempts when the gateway answers 429
        #[arg(long, default_value_t = MAX_JOIN_ATTEMPTS)]
        attempts: u32,
    },
    /// Approve a pending guest
    Approve { session: String, guest: String },
    /// Reject a pending guest
    Reject { session: String, guest: String },
    /// Record that an approved guest's transport came up
    Connected { session: String, guest: String },
    /// Remove a guest from the session
    Kick { session: String, guest: String },
    /// Change a guest's permission
    Permission {
        session: String,
        guest: String,
        permission: String,
    },
    /// End a session
    End { session: String },
    /// Show a session
    Get { session: String },
    /// Show the live session hosted by a user
    Active { user: String },
    /// List pending join requests
    Pending { session: String },
    /// Issue a fresh join code
    Regenerate { session: String },
    /// Clear the join code
    Revoke { session: String },
    /// Open or pause new joins
    AllowJoins {
        session: String,
        #[arg(action = clap::ArgAction::Set)]
        allow: bool,
    },
    /// Show join security counters
    Metrics,
    /// Show ICE server configuration
    Ice,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "warn");

    let args = Args::parse();
    let client = GatewayClient::new(args.url);

    if let Err(e) = run(&client, args.command).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}

async fn run(client: &GatewayClient, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Health => print_json(&OkResponse {
            ok: client.health().await?,
        }),
        Command::Create {
            host,
            name,
            avatar_url,
            max_guests,
            permission,
            mode,
            allow_anonymous,
            code_ttl_minutes,
            workspace,
        } => {
            let request = CreateSessionRequest {
                host_user_id: host,
                host_name: name,
                host_avatar_url: avatar_url,
                config: SessionConfigDto {
                    max_guests,
                    default_permission: permission,
                    allow_anonymous,
                    mode,
                    code_ttl_minutes,
                    workspace_name: workspace,
                },
            };
            print_json(&client.create_session(&request).await?)
        }
        Command::Join {
            code,
            user,
            name,
            avatar_url,
            attempts,
        } => {
            let request = JoinRequest {
                code,
                guest_user_id: user,
                guest_info: GuestInfoDto { name, avatar_url },
            };
            print_json(&join_with_retry(client, &request, attempts).await?)
        }
        Command::Approve { session, guest } => {
            client.approve(&session, &guest).await?;
            print_json(&OkResponse::OK)
        }
        Command::Reject { session, guest } => {
            client.reject(&session, &guest).await?;
            print_json(&OkResponse::OK)
        }
        Command::Connected { session, guest } => {
            client.mark_connected(&session, &guest).await?;
            print_json(&OkResponse::OK)
        }
        Command::Kick { session, guest } => {
            client.kick(&session, &guest).await?;
            print_json(&OkResponse::OK)
        }
        Command::Permission {
            session,
            guest,
            permission,
        } => {
            client.set_permission(&session, &guest, &permission).await?;
            print_json(&OkResponse::OK)
        }
        Command::End { session } => {
            client.end_session(&session).await?;
            print_json(&OkResponse::OK)
        }
        Command::Get { session } => print_json(&client.get_session(&session).await?),
        Command::Active { user } => print_json(&client.active_session(&user).await?),
        Command::Pending { session } => print_json(&client.pending_guests(&session).await?),
        Command::Regenerate { session } => print_json(&client.regenerate_code(&session).await?),
        Command::Revoke { session } => print_json(&client.revoke_code(&session).await?),
        Command::AllowJoins { session, allow } => {
            print_json(&client.set_allow_new_joins(&session, allow).await?)
        }
        Command::Metrics => print_json(&client.join_security_metrics().await?),
        Command::Ice => print_json(&client.ice_servers().await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ClientError> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| ClientError::Decode(e.to_string()))?;
    println!("{text}");
    Ok(())
}

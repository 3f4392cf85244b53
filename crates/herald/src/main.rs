// Herald
// Copyright (C) 2025 Throneless Tech

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use clap_verbosity_flag::Verbosity;
use herald::{
    EntityContext,
    data::EntityRef,
    db::entities::chat_entity::EntityType,
    service::{self, Herald},
    settings::Settings,
};
use herald_common::source::{SourceRef, SubType};
use std::path::PathBuf;
use tracing::info;
use tracing_log::AsTrace;

/// Herald, permission and subscription engine for chat bots
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity
    #[command(flatten)]
    verbose: Verbosity,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// apply database migrations
    Migrate,

    /// run the polling jobs until interrupted
    Run,

    /// manage auth nodes
    #[command(subcommand)]
    Auth(AuthCommands),

    /// manage subscriptions
    #[command(subcommand)]
    Sub(SubCommands),

    /// inspect cooldowns
    #[command(subcommand)]
    Cooldown(CooldownCommands),
}

#[derive(Debug, Args)]
struct EntityArgs {
    /// Bot self-id
    #[arg(short, long)]
    bot: String,

    /// Entity kind: user, group, group_user, guild_channel or bot
    #[arg(short, long, default_value = "group")]
    kind: String,

    /// Entity id within its parent
    #[arg(short, long)]
    id: String,

    /// Group id for group_user, guild id for guild_channel
    #[arg(short, long)]
    parent: Option<String>,
}

impl EntityArgs {
    fn to_ref(&self) -> Result<EntityRef> {
        let kind: EntityType = self.kind.parse()?;
        let parent = || {
            self.parent
                .as_deref()
                .with_context(|| format!("--parent is required for {kind}"))
        };
        Ok(match kind {
            EntityType::Bot => EntityRef::bot(&self.bot, ""),
            EntityType::User => EntityRef::user(&self.bot, &self.id, ""),
            EntityType::Group => EntityRef::group(&self.bot, &self.id, ""),
            EntityType::GroupUser => EntityRef::group_user(&self.bot, parent()?, &self.id, ""),
            EntityType::GuildChannel => {
                EntityRef::guild_channel(&self.bot, parent()?, &self.id, "")
            }
        })
    }
}

#[derive(Debug, Args)]
struct NodeArgs {
    /// Module namespace
    #[arg(short, long, default_value = "herald")]
    module: String,

    /// Plugin namespace
    #[arg(long)]
    plugin: String,

    /// Node name
    #[arg(short, long)]
    node: String,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Source kind: artist_account, social_feed, live_room or aggregator
    #[arg(short = 't', long)]
    sub_type: String,

    /// External source id
    #[arg(short, long)]
    sub_id: String,

    /// Display name of the source
    #[arg(long, default_value = "")]
    name: String,
}

impl SourceArgs {
    fn to_ref(&self) -> Result<SourceRef> {
        Ok(SourceRef::new(
            self.sub_type.parse::<SubType>()?,
            &self.sub_id,
            &self.name,
        ))
    }
}

#[derive(Debug, Subcommand)]
enum AuthCommands {
    /// set an auth node
    #[command(arg_required_else_help = true)]
    Set {
        #[command(flatten)]
        entity: EntityArgs,

        #[command(flatten)]
        node: NodeArgs,

        /// Whether the node is available
        #[arg(short, long, action = ArgAction::Set, default_value_t = true)]
        available: bool,

        /// Optional node value
        #[arg(long)]
        value: Option<String>,
    },

    /// check an auth node
    #[command(arg_required_else_help = true)]
    Check {
        #[command(flatten)]
        entity: EntityArgs,

        #[command(flatten)]
        node: NodeArgs,

        /// Deny when the node has never been set
        #[arg(short, long, action = ArgAction::Set, default_value_t = true)]
        require_available: bool,

        /// Required node value
        #[arg(long)]
        value: Option<String>,
    },

    /// set the permission level
    #[command(arg_required_else_help = true)]
    Level {
        #[command(flatten)]
        entity: EntityArgs,

        /// Numeric level
        #[arg(short, long)]
        level: i32,
    },

    /// switch the global permission on or off
    #[command(arg_required_else_help = true)]
    Global {
        #[command(flatten)]
        entity: EntityArgs,

        /// Whether the entity may use the bot at all
        #[arg(short, long, action = ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Debug, Subcommand)]
enum SubCommands {
    /// subscribe an entity to a source
    #[command(arg_required_else_help = true)]
    Add {
        #[command(flatten)]
        entity: EntityArgs,

        #[command(flatten)]
        source: SourceArgs,

        /// Deliver only items published from now on
        #[arg(long)]
        backfill: bool,
    },

    /// unsubscribe an entity from a source
    #[command(arg_required_else_help = true)]
    Remove {
        #[command(flatten)]
        entity: EntityArgs,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// list an entity's subscriptions
    #[command(arg_required_else_help = true)]
    List {
        #[command(flatten)]
        entity: EntityArgs,
    },
}

#[derive(Debug, Subcommand)]
enum CooldownCommands {
    /// check whether a cooldown has expired
    #[command(arg_required_else_help = true)]
    Check {
        #[command(flatten)]
        entity: EntityArgs,

        /// Event name
        #[arg(short, long)]
        event: String,
    },

    /// clear a cooldown
    #[command(arg_required_else_help = true)]
    Clear {
        #[command(flatten)]
        entity: EntityArgs,

        /// Event name
        #[arg(short, long)]
        event: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.verbose.log_level_filter().as_trace())
        .init();

    let settings = Settings::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Commands::Migrate => {
            service::connect(&settings)
                .await
                .context("Failed to migrate database")?;
            info!(database = %settings.database, "database is up to date");
        }
        Commands::Run => service::run(settings).await?,
        Commands::Auth(command) => auth(command, &settings).await?,
        Commands::Sub(command) => sub(command, &settings).await?,
        Commands::Cooldown(command) => cooldown(command, &settings).await?,
    }

    Ok(())
}

async fn context_for(entity: &EntityArgs, settings: &Settings) -> Result<EntityContext> {
    let db = service::connect(settings)
        .await
        .context("Failed to open database")?;
    Ok(EntityContext::ensure(&entity.to_ref()?, &db).await?)
}

/// Read-only counterpart of [`context_for`]; never registers the entity.
async fn lookup_for(entity: &EntityArgs, settings: &Settings) -> Result<Option<EntityContext>> {
    let db = service::connect(settings)
        .await
        .context("Failed to open database")?;
    Ok(EntityContext::lookup(&entity.to_ref()?, &db).await?)
}

async fn auth(command: AuthCommands, settings: &Settings) -> Result<()> {
    match command {
        AuthCommands::Set {
            entity,
            node,
            available,
            value,
        } => {
            let ctx = context_for(&entity, settings).await?;
            ctx.set_auth_setting(
                &node.module,
                &node.plugin,
                &node.node,
                available,
                value.as_deref(),
            )
            .await?;
            println!("{}/{}/{} = {available}", node.module, node.plugin, node.node);
        }
        AuthCommands::Check {
            entity,
            node,
            require_available,
            value,
        } => {
            let allowed = match lookup_for(&entity, settings).await? {
                Some(ctx) => {
                    ctx.check_auth_setting(
                        &node.module,
                        &node.plugin,
                        &node.node,
                        require_available,
                        value.as_deref(),
                    )
                    .await
                }
                None => false,
            };
            println!("{}", if allowed { "allowed" } else { "denied" });
        }
        AuthCommands::Level { entity, level } => {
            let ctx = context_for(&entity, settings).await?;
            ctx.set_permission_level(level).await?;
            println!("permission level = {level}");
        }
        AuthCommands::Global { entity, enabled } => {
            let ctx = context_for(&entity, settings).await?;
            ctx.set_global_permission(enabled).await?;
            println!("global permission = {enabled}");
        }
    }
    Ok(())
}

async fn sub(command: SubCommands, settings: &Settings) -> Result<()> {
    match command {
        SubCommands::Add {
            entity,
            source,
            backfill,
        } => {
            let ctx = context_for(&entity, settings).await?;
            let source = source.to_ref()?;
            if backfill {
                let herald = Herald::build(settings, service::connect(settings).await?)?;
                let sub_type = source.sub_type;
                if herald.detector.adapters().get(sub_type).is_none() {
                    bail!("no job configured for {sub_type}, cannot backfill");
                }
                let outcome = ctx
                    .subscribe_with_backfill(&source, None, &herald.detector, None)
                    .await?;
                println!("subscribed to {source}, {} items marked seen", outcome.backfilled);
            } else {
                ctx.add_subscription(&source, None).await?;
                println!("subscribed to {source}");
            }
        }
        SubCommands::Remove { entity, source } => {
            let source = source.to_ref()?;
            let removed = match lookup_for(&entity, settings).await? {
                Some(ctx) => ctx.delete_subscription(&source).await?,
                None => false,
            };
            if removed {
                println!("unsubscribed from {source}");
            } else {
                println!("not subscribed to {source}");
            }
        }
        SubCommands::List { entity } => {
            let Some(ctx) = lookup_for(&entity, settings).await? else {
                return Ok(());
            };
            for source in ctx.query_subscribed_source(None).await? {
                println!(
                    "{}:{}\t{}",
                    source.sub_type, source.sub_id, source.sub_user_name
                );
            }
        }
    }
    Ok(())
}

async fn cooldown(command: CooldownCommands, settings: &Settings) -> Result<()> {
    match command {
        CooldownCommands::Check { entity, event } => {
            let Some(ctx) = lookup_for(&entity, settings).await? else {
                println!("{event}: expired");
                return Ok(());
            };
            let status = ctx.check_cooldown_expired(&event).await;
            match (status.expired, status.expired_at) {
                (true, _) => println!("{event}: expired"),
                (false, Some(at)) => println!("{event}: active until {at}"),
                (false, None) => println!("{event}: unknown, treated as active"),
            }
        }
        CooldownCommands::Clear { entity, event } => {
            let cleared = match lookup_for(&entity, settings).await? {
                Some(ctx) => ctx.clear_cooldown(&event).await?,
                None => false,
            };
            if cleared {
                println!("{event}: cleared");
            } else {
                println!("{event}: no cooldown");
            }
        }
    }
    Ok(())
}

//! The `Bot` facade.
//!
//! A [`Bot`] wires one configuration to a dispatcher, a connection supervisor
//! and a resolver, and offers the helpers bot code reaches for most: named
//! channel and admin lookups, sending with truncation, replying, member names
//! and team icons.
//!
//! ```rust,ignore
//! let bot = Bot::new(config, Arc::new(network));
//! bot.on("MESSAGE", |event, _| { /* ... */ Ok(()) }, Vec::new())?;
//! bot.connect().await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use tether_core::{
    BoundArg, Channel, ChatMessage, ClientProvider, Emoji, Event, EventDispatcher, EventKind,
    Guild, Member, ResolutionError, ResolutionResult, ResourceResolver, TransportFactory,
};

use crate::cli::register_url;
use crate::config::BotConfig;
use crate::error::RuntimeResult;
use crate::guard::UncaughtExceptionGuard;
use crate::supervisor::{ConnectionState, ConnectionSupervisor, SupervisorSettings};
use crate::team::{Team, user_is_mod};
use crate::text::{MAX_MESSAGE_LENGTH, truncate_message};

/// A configured bot.
pub struct Bot {
    config: Arc<BotConfig>,
    dispatcher: Arc<EventDispatcher>,
    supervisor: ConnectionSupervisor,
    resolver: ResourceResolver,
    team_icons: Mutex<HashMap<Team, Emoji>>,
}

impl Bot {
    /// Creates a disconnected bot whose clients come from `factory`.
    pub fn new(config: BotConfig, factory: Arc<dyn TransportFactory>) -> Self {
        let dispatcher = Arc::new(EventDispatcher::new());
        let supervisor = ConnectionSupervisor::new(
            factory,
            Arc::clone(&dispatcher),
            config.bot_token.clone(),
            SupervisorSettings::from(&config.connection),
        );
        let resolver = ResourceResolver::new(
            Arc::new(supervisor.clone()),
            config.guild_id.clone(),
            config.channel_ids.clone(),
        )
        .with_policy(config.resolver.to_policy());

        Self {
            config: Arc::new(config),
            dispatcher,
            supervisor,
            resolver,
            team_icons: Mutex::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Events and lifecycle
    // =========================================================================

    /// Subscribes by event name (`"READY"`, `"MESSAGE"`, ...).
    pub fn on<F>(&self, name: &str, callback: F, bound_args: Vec<BoundArg>) -> RuntimeResult<()>
    where
        F: Fn(&Event, &[BoundArg]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on(name, callback, bound_args)?;
        Ok(())
    }

    /// Subscribes to `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F, bound_args: Vec<BoundArg>)
    where
        F: Fn(&Event, &[BoundArg]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(kind, callback, bound_args);
    }

    /// Installs the panic guard and logs in.
    pub async fn connect(&self) -> RuntimeResult<()> {
        UncaughtExceptionGuard::install(Arc::clone(&self.dispatcher))?;
        info!(
            version = %self.config.version,
            guild_id = %self.config.guild_id,
            "Connecting bot"
        );
        self.supervisor.start().await?;
        Ok(())
    }

    /// Logs out. No events follow.
    pub async fn disconnect(&self) {
        self.supervisor.stop().await;
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    // =========================================================================
    // Configuration lookups
    // =========================================================================

    /// The URL that adds this bot to a guild.
    pub fn register_url(&self) -> String {
        register_url(&self.config.client_id)
    }

    /// A named admin's user ID.
    pub fn admin_id(&self, name: &str) -> Option<&str> {
        self.config.admin_id(name)
    }

    /// A named channel's ID.
    pub fn channel_id(&self, name: &str) -> Option<&str> {
        self.config.channel_id(name)
    }

    /// Whether `member` holds one of the configured moderator roles.
    pub fn is_mod(&self, member: &Member) -> bool {
        user_is_mod(member, &self.config.mod_role_names)
    }

    pub fn max_message_length(&self) -> usize {
        MAX_MESSAGE_LENGTH
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// A channel by configured name or ID.
    pub fn channel(&self, id_or_name: &str) -> Option<Channel> {
        self.resolver.resolve_channel(id_or_name, None)
    }

    /// Sends `text` to a channel given by name or ID, truncated to
    /// [`MAX_MESSAGE_LENGTH`].
    ///
    /// Returns `Ok(false)` when the channel is unknown.
    pub async fn send(&self, channel: &str, text: &str) -> RuntimeResult<bool> {
        let Some(channel) = self.channel(channel) else {
            debug!(channel, "Not sending to unknown channel");
            return Ok(false);
        };

        let client = self.supervisor.require()?;
        client
            .send_message(&channel.id, &truncate_message(text))
            .await?;
        Ok(true)
    }

    /// Replies in the channel `message` came from.
    ///
    /// Messages written by bots are skipped (`Ok(false)`) unless
    /// `reply_to_bots` is set.
    pub async fn reply(
        &self,
        message: &ChatMessage,
        text: &str,
        reply_to_bots: bool,
    ) -> RuntimeResult<bool> {
        if message.from_bot() && !reply_to_bots {
            return Ok(false);
        }

        let client = self.supervisor.require()?;
        client
            .send_message(&message.channel_id, &truncate_message(text))
            .await?;
        Ok(true)
    }

    // =========================================================================
    // Guild lookups
    // =========================================================================

    /// The configured guild, or `guild_id`, retried while the cache fills.
    pub async fn guild(&self, guild_id: Option<&str>) -> ResolutionResult<Arc<Guild>> {
        self.resolver.guild(guild_id).await
    }

    pub async fn member(&self, user_id: &str, guild_id: Option<&str>) -> ResolutionResult<Member> {
        self.resolver.resolve_member(user_id, guild_id).await
    }

    /// Nickname, else username, of a member of the configured guild.
    ///
    /// `Ok(None)` when the user is not a member.
    pub async fn username_of_user_id(&self, user_id: &str) -> ResolutionResult<Option<String>> {
        match self.member(user_id, None).await {
            Ok(member) => Ok(Some(member.display_name().to_string())),
            Err(ResolutionError::MemberNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The guild emoji of `team`.
    ///
    /// Found icons are remembered for the bot's lifetime; misses are looked
    /// up again next time.
    pub async fn team_icon(
        &self,
        team: Team,
        guild_id: Option<&str>,
    ) -> ResolutionResult<Option<Emoji>> {
        if let Some(icon) = self.team_icons.lock().get(&team) {
            return Ok(Some(icon.clone()));
        }

        let guild = self.guild(guild_id).await?;
        let icon = guild.emoji_named(team.icon_name()).cloned();
        if let Some(icon) = &icon {
            self.team_icons.lock().insert(team, icon.clone());
        }
        Ok(icon)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("config", &self.config)
            .field("supervisor", &self.supervisor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawBotConfig;
    use crate::error::RuntimeError;
    use serde_json::json;
    use std::time::Duration;
    use tether_core::{DispatchError, MemoryNetwork, Role, User};

    fn config() -> BotConfig {
        BotConfig::try_from(RawBotConfig {
            guild_id: Some("g1".into()),
            bot_token: Some("token".into()),
            client_id: Some("1234".into()),
            version: Some("1.1".into()),
            description: Some("raid bot".into()),
            admin_ids: HashMap::from([("owner".to_string(), "u9".to_string())]),
            channel_ids: HashMap::from([("raids".to_string(), "c1".to_string())]),
            mod_role_names: vec!["moderator".into()],
            ..Default::default()
        })
        .unwrap()
    }

    fn network() -> MemoryNetwork {
        let guild = Guild::new("g1", "Sittard")
            .with_member(Member::new(User::new("u1", "ash")).with_nickname("Ash K."))
            .with_member(Member::new(User::new("u2", "misty")))
            .with_emoji(Emoji::new("e1", "valor"));
        MemoryNetwork::new()
            .with_guild(guild)
            .with_channel(Channel::new("c1", "raids", "g1"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_and_receive_bound_args() {
        let network = network();
        let bot = Bot::new(config(), Arc::new(network.clone()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        bot.on(
            "MESSAGE",
            move |event, args| {
                let message = event.as_message().unwrap();
                sink.lock().push((message.content.clone(), args.to_vec()));
                Ok(())
            },
            vec![json!("x")],
        )
        .unwrap();

        bot.connect().await.unwrap();
        assert!(UncaughtExceptionGuard::is_installed());
        bot.supervisor()
            .watch_state()
            .wait_for(|state| *state == ConnectionState::Connected)
            .await
            .unwrap();

        let message = ChatMessage::new("m1", "c1", User::new("u1", "ash"), "hi");
        network
            .latest()
            .unwrap()
            .emit(tether_core::RawEvent::Message(message));
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(*seen.lock(), vec![("hi".to_string(), vec![json!("x")])]);

        bot.disconnect().await;
        assert_eq!(bot.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_unknown_event_name() {
        let bot = Bot::new(config(), Arc::new(network()));
        let err = bot.on("RECONNECTING", |_, _| Ok(()), Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Dispatch(DispatchError::InvalidEventKind { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_resolves_alias_and_truncates() {
        let network = network();
        let bot = Bot::new(config(), Arc::new(network.clone()));
        bot.connect().await.unwrap();

        let long = "x".repeat(3000);
        assert!(bot.send("Raids", &long).await.unwrap());
        assert!(!bot.send("general", "hello").await.unwrap());

        let sent = network.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel_id, "c1");
        assert_eq!(sent[0].content.chars().count(), bot.max_message_length() + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_skips_bots_unless_asked() {
        let network = network();
        let bot = Bot::new(config(), Arc::new(network.clone()));
        bot.connect().await.unwrap();

        let from_bot = ChatMessage::new("m1", "c1", User::new("b1", "raidbot").as_bot(), "!hi");
        assert!(!bot.reply(&from_bot, "hello", false).await.unwrap());
        assert!(bot.reply(&from_bot, "hello", true).await.unwrap());
        assert_eq!(network.sent_messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_without_connection_fails() {
        let bot = Bot::new(config(), Arc::new(network()));
        let message = ChatMessage::new("m1", "c1", User::new("u1", "ash"), "!hi");

        let err = bot.reply(&message, "hello", false).await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Transport(tether_core::TransportError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_member_names() {
        let bot = Bot::new(config(), Arc::new(network()));
        bot.connect().await.unwrap();

        assert_eq!(
            bot.username_of_user_id("u1").await.unwrap().as_deref(),
            Some("Ash K.")
        );
        assert_eq!(
            bot.username_of_user_id("u2").await.unwrap().as_deref(),
            Some("misty")
        );
        assert_eq!(bot.username_of_user_id("u3").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_team_icon_is_memoized() {
        let network = network();
        let bot = Bot::new(config(), Arc::new(network.clone()));
        bot.connect().await.unwrap();

        let icon = bot.team_icon(Team::Valor, None).await.unwrap().unwrap();
        assert_eq!(icon.name, "valor");
        assert_eq!(bot.team_icon(Team::Mystic, None).await.unwrap(), None);

        network.insert_guild(Guild::new("g1", "Sittard"));
        assert_eq!(bot.team_icon(Team::Valor, None).await.unwrap(), Some(icon));
    }

    #[test]
    fn test_config_lookups() {
        let bot = Bot::new(config(), Arc::new(network()));

        assert_eq!(bot.admin_id("Owner"), Some("u9"));
        assert_eq!(bot.channel_id("RAIDS"), Some("c1"));
        assert_eq!(
            bot.register_url(),
            "https://discordapp.com/oauth2/authorize?&client_id=1234&scope=bot&permissions=0"
        );

        let moderator = Member::new(User::new("u5", "brock")).with_role(Role::new("r1", "Moderator"));
        assert!(bot.is_mod(&moderator));
    }
}

//! Bounded-retry resolution of guilds, members and channels.
//!
//! Right after `Ready` a client may not have received every guild yet, so a
//! single lookup is not reliable. [`ResourceResolver::resolve_guild`] polls
//! the live client's cache under a [`RetryPolicy`] and fails loudly once the
//! budget is spent: a guild that is still missing after that is a wrong id,
//! not a slow network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{ResolutionError, ResolutionResult};
use crate::model::{Channel, Guild, Member};
use crate::transport::ClientProvider;

/// How often and how patiently to poll for a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Default number of lookups.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    /// Default pause between lookups.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

    /// Creates a policy. `max_attempts` is raised to 1 if zero.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Total lookups before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause between two lookups.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

/// Resolves platform objects through whichever client is currently live.
#[derive(Clone)]
pub struct ResourceResolver {
    provider: Arc<dyn ClientProvider>,
    default_guild_id: String,
    channel_aliases: HashMap<String, String>,
    policy: RetryPolicy,
}

impl ResourceResolver {
    /// Creates a resolver.
    ///
    /// `channel_aliases` maps configured names to channel IDs; names are
    /// matched case-insensitively.
    pub fn new(
        provider: Arc<dyn ClientProvider>,
        default_guild_id: impl Into<String>,
        channel_aliases: HashMap<String, String>,
    ) -> Self {
        let channel_aliases = channel_aliases
            .into_iter()
            .map(|(name, id)| (name.to_lowercase(), id))
            .collect();

        Self {
            provider,
            default_guild_id: default_guild_id.into(),
            channel_aliases,
            policy: RetryPolicy::default(),
        }
    }

    /// Replaces the policy used by the convenience lookups.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The policy used by the convenience lookups.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// The guild used when callers pass `None`.
    pub fn default_guild_id(&self) -> &str {
        &self.default_guild_id
    }

    /// Maps a configured channel name to its ID.
    pub fn channel_alias(&self, name: &str) -> Option<&str> {
        self.channel_aliases
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    /// Resolves a guild, polling under `policy`.
    ///
    /// A lookup fails when no client is live, the guild is not cached yet, or
    /// the platform marks it unavailable. The delay is only slept between
    /// lookups, never after the last one.
    pub async fn resolve_guild(
        &self,
        guild_id: Option<&str>,
        policy: RetryPolicy,
    ) -> ResolutionResult<Arc<Guild>> {
        let guild_id = guild_id.unwrap_or(self.default_guild_id.as_str());

        for attempt in 1..=policy.max_attempts() {
            let guild = self
                .provider
                .current()
                .and_then(|client| client.guild(guild_id));

            match guild {
                Some(guild) if guild.available => {
                    trace!(guild_id, attempt, "Guild resolved");
                    return Ok(guild);
                }
                Some(_) => debug!(guild_id, attempt, "Guild is marked unavailable"),
                None => debug!(guild_id, attempt, "Guild not cached yet"),
            }

            if attempt < policy.max_attempts() {
                tokio::time::sleep(policy.delay()).await;
            }
        }

        warn!(
            guild_id,
            attempts = policy.max_attempts(),
            "Giving up on guild"
        );
        Err(ResolutionError::GuildUnavailable {
            guild_id: guild_id.to_string(),
            attempts: policy.max_attempts(),
        })
    }

    /// Resolves a guild with the resolver's own policy.
    pub async fn guild(&self, guild_id: Option<&str>) -> ResolutionResult<Arc<Guild>> {
        self.resolve_guild(guild_id, self.policy).await
    }

    /// Resolves a member of a guild.
    ///
    /// Guild failures are passed through unchanged; a missing member is the
    /// non-fatal [`ResolutionError::MemberNotFound`].
    pub async fn resolve_member(
        &self,
        user_id: &str,
        guild_id: Option<&str>,
    ) -> ResolutionResult<Member> {
        let guild = self.guild(guild_id).await?;
        guild
            .member(user_id)
            .cloned()
            .ok_or_else(|| ResolutionError::MemberNotFound {
                user_id: user_id.to_string(),
                guild_id: guild.id.clone(),
            })
    }

    /// Resolves a channel by configured name or by ID.
    ///
    /// Returns `None` when neither matches, or when `guild_id` is given and
    /// the channel belongs elsewhere. A missing channel is routine (a typo in
    /// a command argument), so this is not an error.
    pub fn resolve_channel(&self, id_or_name: &str, guild_id: Option<&str>) -> Option<Channel> {
        let channel_id = self.channel_alias(id_or_name).unwrap_or(id_or_name);
        let channel = self.provider.current()?.channel(channel_id)?;

        match guild_id {
            Some(guild_id) if channel.guild_id.as_deref() != Some(guild_id) => {
                debug!(channel_id, guild_id, "Channel belongs to another guild");
                None
            }
            _ => Some(channel),
        }
    }
}

impl std::fmt::Debug for ResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver")
            .field("default_guild_id", &self.default_guild_id)
            .field("channel_aliases", &self.channel_aliases)
            .field("policy", &self.policy)
            .finish()
    }
}

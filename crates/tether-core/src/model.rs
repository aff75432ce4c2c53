//! Chat platform objects as seen through a transport client's local cache.
//!
//! These are plain snapshots: a [`Guild`] handed out by the resolver is only
//! meaningful for the connection it was read from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: String,
    /// Account name.
    pub username: String,
    /// Whether the account is a bot.
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Creates a human user.
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            bot: false,
        }
    }

    /// Marks the user as a bot account.
    pub fn as_bot(mut self) -> Self {
        self.bot = true;
        self
    }
}

/// A guild role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role ID.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl Role {
    /// Creates a role.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A user's membership in a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The underlying user.
    pub user: User,
    /// Guild-specific nickname.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Roles held in the guild, in platform order.
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Member {
    /// Creates a member without nickname or roles.
    pub fn new(user: User) -> Self {
        Self {
            user,
            nickname: None,
            roles: Vec::new(),
        }
    }

    /// Sets the nickname.
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    /// Adds a role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Nickname if set, otherwise the account name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.user.username)
    }
}

/// A custom guild emoji.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    /// Emoji ID.
    pub id: String,
    /// Emoji name, without colons.
    pub name: String,
}

impl Emoji {
    /// Creates an emoji.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Emoji {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<:{}:{}>", self.name, self.id)
    }
}

/// A guild (server).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    /// Guild ID.
    pub id: String,
    /// Guild name.
    pub name: String,
    /// `false` while the platform reports an outage for this guild.
    #[serde(default = "default_available")]
    pub available: bool,
    /// Members keyed by user ID.
    #[serde(default)]
    pub members: HashMap<String, Member>,
    /// Custom emojis.
    #[serde(default)]
    pub emojis: Vec<Emoji>,
}

fn default_available() -> bool {
    true
}

impl Guild {
    /// Creates an available guild with no members.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            available: true,
            members: HashMap::new(),
            emojis: Vec::new(),
        }
    }

    /// Adds a member.
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.insert(member.user.id.clone(), member);
        self
    }

    /// Adds an emoji.
    pub fn with_emoji(mut self, emoji: Emoji) -> Self {
        self.emojis.push(emoji);
        self
    }

    /// Sets availability.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Looks up a member by user ID.
    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.get(user_id)
    }

    /// Finds the first emoji with the given name.
    pub fn emoji_named(&self, name: &str) -> Option<&Emoji> {
        self.emojis.iter().find(|e| e.name == name)
    }
}

/// A text channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel ID.
    pub id: String,
    /// Channel name.
    pub name: String,
    /// Owning guild, `None` for direct messages.
    #[serde(default)]
    pub guild_id: Option<String>,
}

impl Channel {
    /// Creates a guild channel.
    pub fn new(id: impl Into<String>, name: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            guild_id: Some(guild_id.into()),
        }
    }
}

/// An incoming chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message ID.
    pub id: String,
    /// Channel the message was posted in.
    pub channel_id: String,
    /// Guild of the channel, if any.
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Author account.
    pub author: User,
    /// Author's guild membership. The platform occasionally omits it.
    #[serde(default)]
    pub member: Option<Member>,
    /// Raw text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a message without member information.
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        author: User,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            guild_id: None,
            author,
            member: None,
            content: content.into(),
        }
    }

    /// Attaches the author's guild membership.
    pub fn with_member(mut self, guild_id: impl Into<String>, member: Member) -> Self {
        self.guild_id = Some(guild_id.into());
        self.member = Some(member);
        self
    }

    /// Name to address the author by: guild nickname, else account name,
    /// else `unknown` when the platform left out the membership.
    pub fn display_name(&self) -> &str {
        match &self.member {
            Some(member) => member.display_name(),
            None => "unknown",
        }
    }

    /// Content with surrounding whitespace removed.
    pub fn trimmed_content(&self) -> &str {
        self.content.trim()
    }

    /// Whether the author is a bot account.
    pub fn from_bot(&self) -> bool {
        self.author.bot
    }
}

//! Team and role helpers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use tether_core::Member;

/// A team a member can belong to, read from their role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Valor,
    Mystic,
    Instinct,
    Remote,
}

impl Team {
    pub const ALL: [Team; 4] = [Team::Valor, Team::Mystic, Team::Instinct, Team::Remote];

    /// Lower-case name, which is also the role name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valor => "valor",
            Self::Mystic => "mystic",
            Self::Instinct => "instinct",
            Self::Remote => "remote",
        }
    }

    /// Name of the guild emoji for this team.
    pub fn icon_name(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name that is not a team.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown team '{0}'")]
pub struct UnknownTeam(pub String);

impl FromStr for Team {
    type Err = UnknownTeam;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_lowercase();
        Team::ALL
            .into_iter()
            .find(|team| team.as_str() == name)
            .ok_or(UnknownTeam(name))
    }
}

/// The team of the first role that names one.
pub fn team_of_member(member: &Member) -> Option<Team> {
    member.roles.iter().find_map(|role| role.name.parse().ok())
}

/// Whether any of the member's roles is a moderator role.
pub fn user_is_mod(member: &Member, mod_role_names: &[String]) -> bool {
    member.roles.iter().any(|role| {
        let name = role.name.to_lowercase();
        mod_role_names
            .iter()
            .any(|mod_role| mod_role.to_lowercase() == name)
    })
}

/// Whether the member has a role called `role_name`, ignoring case.
pub fn user_has_role(member: &Member, role_name: &str) -> bool {
    let wanted = role_name.to_lowercase();
    member
        .roles
        .iter()
        .any(|role| role.name.to_lowercase() == wanted)
}

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed role hierarchy with a total order over ranks. Upstream systems hand
/// us free-form role strings; anything unrecognized collapses to `Viewer`
/// rather than failing, so a missing or garbled role can never grant access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Viewer,
    Operator,
    Admin,
    Owner,
}

impl ActorRole {
    pub fn rank(self) -> u8 {
        match self {
            Self::Viewer => 0,
            Self::Operator => 30,
            Self::Admin => 70,
            Self::Owner => 100,
        }
    }

    /// Maps a role string to the closed enum, defaulting unknown values to
    /// the bottom rank.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Self::Owner,
            "admin" => Self::Admin,
            "operator" => Self::Operator,
            _ => Self::Viewer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Operator => "operator",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }
}

/// Minimum rank a tool demands. Declared once per tool at registration time;
/// the mapping from tier to rank is static, reviewed data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolTier {
    Any,
    Operator,
    Admin,
    Owner,
}

impl ToolTier {
    pub fn min_rank(self) -> u8 {
        match self {
            Self::Any => 0,
            Self::Operator => 30,
            Self::Admin => 70,
            Self::Owner => 100,
        }
    }

    pub fn allows(self, role: ActorRole) -> bool {
        role.rank() >= self.min_rank()
    }
}

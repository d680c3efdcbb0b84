//! Wire models returned by the content-indexing service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ripple_common::types::{Approval, normalize_address, short_address};

/// ENS identity attached to an author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsInfo {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Farcaster identity attached to an author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarcasterInfo {
    #[serde(default)]
    pub fid: Option<u64>,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub pfp_url: Option<String>,
}

/// An author as resolved by the indexer. Doubles as the display profile on the read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub address: String,
    #[serde(default)]
    pub ens: Option<EnsInfo>,
    #[serde(default)]
    pub farcaster: Option<FarcasterInfo>,
}

impl Author {
    /// Profile with no resolved identities.
    pub fn bare(address: &str) -> Self {
        Self {
            address: normalize_address(address),
            ens: None,
            farcaster: None,
        }
    }

    /// Human-facing handle: ENS name, then Farcaster username, then a shortened address.
    pub fn display_name(&self) -> String {
        if let Some(ens) = &self.ens
            && !ens.name.is_empty()
        {
            return ens.name.clone();
        }
        if let Some(fc) = &self.farcaster
            && !fc.username.is_empty()
        {
            return fc.username.clone();
        }
        short_address(&self.address)
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.ens
            .as_ref()
            .and_then(|e| e.avatar_url.as_deref())
            .or_else(|| self.farcaster.as_ref().and_then(|f| f.pfp_url.as_deref()))
    }
}

/// Character span of a reference inside the comment text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: u64,
    pub end: u64,
}

/// A typed entry in a comment's reference list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawReference", into = "RawReference")]
pub enum Reference {
    Ens {
        address: String,
        name: Option<String>,
        position: Option<Position>,
    },
    Farcaster {
        address: String,
        username: Option<String>,
        fid: Option<u64>,
        position: Option<Position>,
    },
    Erc20 {
        address: Option<String>,
        symbol: Option<String>,
        position: Option<Position>,
    },
    Webpage {
        url: String,
        title: Option<String>,
        position: Option<Position>,
    },
    Media {
        kind: String,
        url: String,
        media_type: Option<String>,
        position: Option<Position>,
    },
    Unknown {
        kind: String,
    },
}

impl Reference {
    /// Address of the mentioned account, for reference kinds that mention one.
    pub fn mentioned_address(&self) -> Option<&str> {
        match self {
            Reference::Ens { address, .. } | Reference::Farcaster { address, .. } => {
                Some(address.as_str())
            }
            _ => None,
        }
    }
}

/// Flat wire shape of a reference. The indexer sends every kind with the
/// same optional field set, discriminated by `type`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReference {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<Position>,
}

impl From<RawReference> for Reference {
    fn from(raw: RawReference) -> Self {
        let RawReference {
            kind,
            address,
            url,
            name,
            username,
            fid,
            symbol,
            title,
            media_type,
            position,
        } = raw;

        match (kind.as_str(), address, url) {
            ("ens", Some(address), _) => Reference::Ens {
                address,
                name,
                position,
            },
            ("farcaster", Some(address), _) => Reference::Farcaster {
                address,
                username,
                fid,
                position,
            },
            ("erc20", address, _) => Reference::Erc20 {
                address,
                symbol,
                position,
            },
            ("webpage", _, Some(url)) => Reference::Webpage {
                url,
                title,
                position,
            },
            ("image" | "video" | "file", _, Some(url)) => Reference::Media {
                kind: kind.clone(),
                url,
                media_type,
                position,
            },
            _ => Reference::Unknown { kind: kind.clone() },
        }
    }
}

impl From<Reference> for RawReference {
    fn from(reference: Reference) -> Self {
        match reference {
            Reference::Ens {
                address,
                name,
                position,
            } => RawReference {
                kind: "ens".to_string(),
                address: Some(address),
                name,
                position,
                ..Default::default()
            },
            Reference::Farcaster {
                address,
                username,
                fid,
                position,
            } => RawReference {
                kind: "farcaster".to_string(),
                address: Some(address),
                username,
                fid,
                position,
                ..Default::default()
            },
            Reference::Erc20 {
                address,
                symbol,
                position,
            } => RawReference {
                kind: "erc20".to_string(),
                address,
                symbol,
                position,
                ..Default::default()
            },
            Reference::Webpage {
                url,
                title,
                position,
            } => RawReference {
                kind: "webpage".to_string(),
                url: Some(url),
                title,
                position,
                ..Default::default()
            },
            Reference::Media {
                kind,
                url,
                media_type,
                position,
            } => RawReference {
                kind,
                url: Some(url),
                media_type,
                position,
                ..Default::default()
            },
            Reference::Unknown { kind } => RawReference {
                kind,
                ..Default::default()
            },
        }
    }
}

/// A comment as returned by `GET /api/comments/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentData {
    pub id: String,
    pub author: Author,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub comment_type: Option<u8>,
    #[serde(default)]
    pub chain_id: Option<i64>,
    /// uint256 on chain; kept as an exact JSON number
    #[serde(default)]
    pub channel_id: Option<serde_json::Number>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl CommentData {
    /// Parent comment id, treating the all-zero id used for top-level comments as absent.
    pub fn parent(&self) -> Option<&str> {
        self.parent_id
            .as_deref()
            .filter(|id| !id.is_empty() && !is_zero_id(id))
    }

    /// Distinct mentioned addresses (lowercased), in first-seen order.
    pub fn mentioned_addresses(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for address in self
            .references
            .iter()
            .filter_map(Reference::mentioned_address)
        {
            let address = normalize_address(address);
            if !seen.contains(&address) {
                seen.push(address);
            }
        }
        seen
    }
}

/// The all-zero id the indexer uses for "no parent".
pub fn is_zero_id(id: &str) -> bool {
    let digits = id.strip_prefix("0x").unwrap_or(id);
    !digits.is_empty() && digits.chars().all(|c| c == '0')
}

/// An approval record as listed by `GET /api/approvals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteApproval {
    pub author: String,
    pub app: String,
    pub chain_id: i64,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<RemoteApproval> for Approval {
    fn from(remote: RemoteApproval) -> Self {
        Approval {
            author: normalize_address(&remote.author),
            app: normalize_address(&remote.app),
            chain_id: remote.chain_id,
            tx_hash: remote.tx_hash,
            log_index: remote.log_index,
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            deleted_at: remote.deleted_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub has_more: bool,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalsPage {
    pub results: Vec<RemoteApproval>,
    pub pagination: Pagination,
}

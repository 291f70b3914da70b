//! Known request-body shapes for the publish init call.
//!
//! The init schema has drifted over time and differs between account tiers, in
//! particular on whether the byte size lives under `source_info`, `upload_param`
//! or both. Each shape is a pure function; the client walks them in order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivacyLevel {
    PublicToEveryone,
    MutualFollowFriends,
    FollowerOfCreator,
    /// Unaudited apps may only post privately.
    #[default]
    SelfOnly,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::PublicToEveryone => "PUBLIC_TO_EVERYONE",
            PrivacyLevel::MutualFollowFriends => "MUTUAL_FOLLOW_FRIENDS",
            PrivacyLevel::FollowerOfCreator => "FOLLOWER_OF_CREATOR",
            PrivacyLevel::SelfOnly => "SELF_ONLY",
        }
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUBLIC_TO_EVERYONE" => Ok(PrivacyLevel::PublicToEveryone),
            "MUTUAL_FOLLOW_FRIENDS" => Ok(PrivacyLevel::MutualFollowFriends),
            "FOLLOWER_OF_CREATOR" => Ok(PrivacyLevel::FollowerOfCreator),
            "SELF_ONLY" => Ok(PrivacyLevel::SelfOnly),
            other => Err(format!("unknown privacy level {other}")),
        }
    }
}

/// Caller supplied post metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostMeta {
    pub caption: String,
    pub privacy_level: PrivacyLevel,
    pub disable_comment: bool,
    pub disable_duet: bool,
    pub disable_stitch: bool,
    pub cover_timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoSource {
    FileUpload { size: u64 },
    PullFromUrl { url: String },
}

#[derive(Debug, Clone)]
pub struct InitInput {
    pub source: VideoSource,
    pub meta: PostMeta,
}

impl InitInput {
    pub fn needs_upload_url(&self) -> bool {
        matches!(self.source, VideoSource::FileUpload { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitEndpoint {
    DirectPost,
    Inbox,
}

impl InitEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            InitEndpoint::DirectPost => "v2/post/publish/video/init/",
            InitEndpoint::Inbox => "v2/post/publish/inbox/video/init/",
        }
    }
}

/// One named request shape. `build` returns `None` when the shape does not apply to the source.
#[derive(Clone, Copy)]
pub struct InitVariant {
    pub name: &'static str,
    pub endpoint: InitEndpoint,
    pub build: fn(&InitInput) -> Option<Value>,
}

impl fmt::Debug for InitVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InitVariant").field("name", &self.name).field("endpoint", &self.endpoint).finish()
    }
}

pub fn default_variants() -> Vec<InitVariant> {
    vec![
        InitVariant { name: "direct_post_source_info", endpoint: InitEndpoint::DirectPost, build: direct_post_source_info },
        InitVariant { name: "direct_post_upload_param", endpoint: InitEndpoint::DirectPost, build: direct_post_upload_param },
        InitVariant { name: "direct_post_both", endpoint: InitEndpoint::DirectPost, build: direct_post_both },
        InitVariant { name: "inbox_source_info", endpoint: InitEndpoint::Inbox, build: inbox_source_info },
    ]
}

fn post_info(meta: &PostMeta) -> Value {
    json!({
        "title": meta.caption,
        "privacy_level": meta.privacy_level,
        "disable_comment": meta.disable_comment,
        "disable_duet": meta.disable_duet,
        "disable_stitch": meta.disable_stitch,
        "video_cover_timestamp_ms": meta.cover_timestamp_ms,
    })
}

/// Whole file in one chunk.
fn size_fields(size: u64) -> Value {
    json!({
        "video_size": size,
        "chunk_size": size,
        "total_chunk_count": 1,
    })
}

fn source_info(source: &VideoSource, with_size: bool) -> Value {
    match source {
        VideoSource::FileUpload { size } => {
            let mut info = if with_size { size_fields(*size) } else { json!({}) };
            info["source"] = json!("FILE_UPLOAD");
            info
        }
        VideoSource::PullFromUrl { url } => json!({
            "source": "PULL_FROM_URL",
            "video_url": url,
        }),
    }
}

pub fn direct_post_source_info(input: &InitInput) -> Option<Value> {
    Some(json!({
        "post_info": post_info(&input.meta),
        "source_info": source_info(&input.source, true),
    }))
}

pub fn direct_post_upload_param(input: &InitInput) -> Option<Value> {
    let VideoSource::FileUpload { size } = input.source else {
        return None;
    };
    Some(json!({
        "post_info": post_info(&input.meta),
        "source_info": source_info(&input.source, false),
        "upload_param": size_fields(size),
    }))
}

pub fn direct_post_both(input: &InitInput) -> Option<Value> {
    let VideoSource::FileUpload { size } = input.source else {
        return None;
    };
    Some(json!({
        "post_info": post_info(&input.meta),
        "source_info": source_info(&input.source, true),
        "upload_param": size_fields(size),
    }))
}

pub fn inbox_source_info(input: &InitInput) -> Option<Value> {
    Some(json!({ "source_info": source_info(&input.source, true) }))
}

//! Release-name parsing.
//!
//! Extracts the covered episodes, season-pack marker, proper level, release
//! group and quality from scene-style release names such as
//! `Show.Name.S01E02.720p.WEB-DL.x264-GRP`.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::quality::Quality;

static EPISODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\W_])s(\d{1,3})[ ._-]?e(\d{1,4})((?:[ ._]?e\d{1,4})*)(?:-e?(\d{1,4}))?(?:[\W_]|$)")
        .unwrap()
});

static CROSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[\W_])(\d{1,2})x(\d{2,3})(?:[\W_]|$)").unwrap());

static SEASON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\W_])(?:s(\d{1,3})|season[ ._-]?(\d{1,3}))(?:[\W_]|$)").unwrap()
});

static EXTRA_EPISODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)e(\d{1,4})").unwrap());

static GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-([A-Za-z0-9]+)$").unwrap());

static TRAILING_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s*\[[^\]]*\])+$|\.(?i:mkv|avi|mp4|nzb|torrent)$").unwrap());

/// Everything the engine derives from a release name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRelease {
    pub season: Option<u32>,
    pub episodes: Vec<u32>,
    /// Season marker present without any episode marker.
    pub is_season_pack: bool,
    pub proper_level: u32,
    pub is_repack: bool,
    pub release_group: String,
    pub quality: Quality,
}

pub fn parse_release(name: &str) -> ParsedRelease {
    let (season, episodes) = parse_episodes(name);
    let season_only = if episodes.is_empty() {
        parse_season(name)
    } else {
        None
    };
    ParsedRelease {
        season: season.or(season_only),
        is_season_pack: episodes.is_empty() && season_only.is_some(),
        episodes,
        proper_level: proper_level(name),
        is_repack: is_repack(name),
        release_group: release_group(name).unwrap_or_default(),
        quality: quality_from_name(name),
    }
}

/// Season and episode numbers from `SxxEyy` style markers, falling back to `1x02`.
pub fn parse_episodes(name: &str) -> (Option<u32>, Vec<u32>) {
    if let Some(caps) = EPISODE_RE.captures(name) {
        let season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let mut episodes: Vec<u32> = Vec::new();
        if let Some(first) = caps.get(2).and_then(|m| m.as_str().parse().ok()) {
            episodes.push(first);
        }
        if let Some(extra) = caps.get(3) {
            episodes.extend(
                EXTRA_EPISODE_RE
                    .captures_iter(extra.as_str())
                    .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<u32>().ok())),
            );
        }
        if let Some(last) = caps.get(4).and_then(|m| m.as_str().parse::<u32>().ok()) {
            if let Some(&start) = episodes.last() {
                if last > start && last - start < 100 {
                    episodes.extend(start + 1..=last);
                }
            }
        }
        episodes.sort_unstable();
        episodes.dedup();
        return (season, episodes);
    }

    if let Some(caps) = CROSS_RE.captures(name) {
        let season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let episodes = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .into_iter()
            .collect();
        return (season, episodes);
    }

    (None, Vec::new())
}

fn parse_season(name: &str) -> Option<u32> {
    let caps = SEASON_RE.captures(name)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn tokens(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

/// Number of PROPER/REPACK/RERIP markers. `REAL` counts only next to one of them,
/// so show titles containing the word do not count.
pub fn proper_level(name: &str) -> u32 {
    let tokens = tokens(name);
    let is_marker = |t: &str| matches!(t, "proper" | "repack" | "rerip");
    let mut level = 0;
    for (i, token) in tokens.iter().enumerate() {
        if is_marker(token) {
            level += 1;
        } else if token == "real" {
            let next = tokens.get(i + 1).map(String::as_str).unwrap_or("");
            let prev = if i > 0 { tokens[i - 1].as_str() } else { "" };
            if is_marker(next) || is_marker(prev) {
                level += 1;
            }
        }
    }
    level
}

pub fn is_repack(name: &str) -> bool {
    tokens(name).iter().any(|t| t == "repack" || t == "rerip")
}

/// Trailing `-GROUP` of a release name, ignoring file extensions and bracket tags.
pub fn release_group(name: &str) -> Option<String> {
    let trimmed = TRAILING_TAG_RE.replace(name.trim(), "");
    GROUP_RE
        .captures(trimmed.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Quality implied by resolution and source tokens.
pub fn quality_from_name(name: &str) -> Quality {
    let tokens = tokens(name);
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));
    let lower = name.to_ascii_lowercase();

    let uhd = has(&["2160p", "4k", "uhd"]);
    let full_hd = has(&["1080p", "1080i"]);
    let hd = has(&["720p"]);
    let bluray = has(&["bluray", "bdrip", "brrip", "bdremux", "remux"]) || lower.contains("blu-ray");
    let web = has(&["webdl", "webrip", "web", "amzn", "nf", "dsnp", "hulu"])
        || lower.contains("web-dl");
    let tv = has(&["hdtv", "pdtv", "dsr", "sdtv", "tvrip", "satrip"]);
    let dvd = has(&["dvdrip", "dvd", "dvdscr", "dvd5", "dvd9"]);
    let sd_codec = has(&["xvid", "divx", "x264", "h264"]);

    if uhd {
        return if bluray {
            Quality::Uhd4kBluray
        } else {
            Quality::Uhd4kWeb
        };
    }
    if full_hd {
        return if bluray {
            Quality::FullHdBluray
        } else if web {
            Quality::FullHdWebDl
        } else {
            Quality::FullHdTv
        };
    }
    if hd {
        return if bluray {
            Quality::HdBluray
        } else if web {
            Quality::HdWebDl
        } else {
            Quality::Hdtv
        };
    }
    if dvd || bluray {
        return Quality::Sddvd;
    }
    if tv || web || sd_codec {
        return Quality::Sdtv;
    }
    Quality::Unknown
}

/// Lowercase, punctuation-free form used for lookups in pre databases.
pub fn sanitize_scene_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else if matches!(c, '.' | '-' | '_' | ' ') {
            pending_space = true;
        }
    }
    out
}

//! Splits a season-pack NZB into one NZB per episode.
//!
//! Files are grouped by the episode named in the quoted file name of their
//! `subject` attribute. Each group keeps the document's head and footer so
//! it is a complete NZB on its own.

use std::collections::BTreeMap;
use std::ops::Range;

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex_lite::Regex;
use thiserror::Error;
use tracing::debug;

use crate::naming::parse_episodes;

static FILE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\.vol\d+[+-]\d+)?(?:\.part\d+)?\.[a-z0-9]{2,5}$").unwrap()
});

#[derive(Debug, Error)]
pub enum NzbSplitError {
    #[error("Invalid NZB: {0}")]
    Xml(String),

    #[error("NZB contains no files")]
    NoFiles,
}

/// One episode's share of a season pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NzbPart {
    /// Release name derived from the file names.
    pub name: String,
    pub season: u32,
    pub episodes: Vec<u32>,
    pub nzb: String,
}

struct FileSpan {
    subject: String,
    span: Range<usize>,
}

/// Quoted file name in a subject, or the subject itself.
fn subject_file_name(subject: &str) -> &str {
    let mut parts = subject.splitn(3, '"');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(name), Some(_)) => name,
        _ => subject,
    }
}

fn release_name(file_name: &str) -> String {
    FILE_SUFFIX_RE.replace(file_name, "").into_owned()
}

fn read_files(xml: &str) -> Result<Vec<FileSpan>, NzbSplitError> {
    let mut reader = Reader::from_str(xml);
    let mut files = Vec::new();
    let mut open: Option<(String, usize)> = None;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"file" => {
                let mut subject = String::new();
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"subject" {
                        let raw = String::from_utf8_lossy(&attr.value).into_owned();
                        subject = quick_xml::escape::unescape(&raw)
                            .map(|s| s.into_owned())
                            .unwrap_or(raw);
                    }
                }
                open = Some((subject, before));
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"file" => {
                if let Some((subject, start)) = open.take() {
                    files.push(FileSpan {
                        subject,
                        span: start..reader.buffer_position() as usize,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(NzbSplitError::Xml(e.to_string())),
        }
    }

    Ok(files)
}

/// Split `xml` into per-episode documents.
///
/// Files that name no episode, such as season-wide par2 or nfo files, are
/// dropped. Files naming no season are assigned to `season`.
pub fn split_nzb(xml: &str, season: u32) -> Result<Vec<NzbPart>, NzbSplitError> {
    let files = read_files(xml)?;
    let (first, last) = match (files.first(), files.last()) {
        (Some(first), Some(last)) => (first.span.start, last.span.end),
        _ => return Err(NzbSplitError::NoFiles),
    };
    let head = &xml[..first];
    let tail = &xml[last..];

    let mut groups: BTreeMap<(u32, Vec<u32>), (String, Vec<&FileSpan>)> = BTreeMap::new();
    for file in &files {
        let file_name = subject_file_name(&file.subject);
        let (file_season, episodes) = parse_episodes(file_name);
        if episodes.is_empty() {
            debug!(subject = %file.subject, "Dropping file without an episode");
            continue;
        }
        let key = (file_season.unwrap_or(season), episodes);
        groups
            .entry(key)
            .or_insert_with(|| (release_name(file_name), Vec::new()))
            .1
            .push(file);
    }

    Ok(groups
        .into_iter()
        .map(|((season, episodes), (name, members))| {
            let mut nzb = String::from(head);
            for member in members {
                nzb.push_str(&xml[member.span.clone()]);
                nzb.push('\n');
            }
            nzb.push_str(tail);
            NzbPart {
                name,
                season,
                episodes,
                nzb,
            }
        })
        .collect())
}

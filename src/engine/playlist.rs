// src/engine/playlist.rs
// Playlist CSV import for the mingo engine.
//
// The input file is produced by the playlist export step: a header row
// carrying the playlist name, then one row per track:
//   sequence, sequence, title, track id, artist
// Fields may be quoted, since titles regularly contain commas.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub track_id: String,
    pub artist: String,
}

#[derive(Debug, Clone)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<TrackInfo>,
}

impl Playlist {
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::Playlist(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_csv(&content)
    }

    pub fn from_csv(content: &str) -> Result<Self, EngineError> {
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| EngineError::Playlist("input file is empty".to_string()))?;
        let name = split_csv_line(header)
            .into_iter()
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| EngineError::Playlist("missing playlist name header".to_string()))?;

        let mut tracks = Vec::new();
        let mut seen_titles = HashSet::new();

        for line in lines {
            let fields = split_csv_line(line);
            if fields.len() < 5 {
                return Err(EngineError::Playlist(format!(
                    "malformed track row (expected 5 fields): {line}"
                )));
            }

            let title = short_title(&fields[2]);
            let track_id = fields[3].clone();
            let artist = fields[4].clone();

            // Two tracks with the same shortened title would be
            // indistinguishable on a card, keep only the first.
            if !seen_titles.insert(title.clone()) {
                println!(
                    "The track named {title} by {artist} was not used because its name is very similar to another track already used."
                );
                continue;
            }

            tracks.push(TrackInfo { title, track_id, artist });
        }

        Ok(Playlist { name, tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Strip the metadata suffix streaming services append after a
/// " - " separator ("Song - Remastered 2011" becomes "Song"). Hyphens
/// inside a title are not preceded by a space and survive.
pub fn short_title(title: &str) -> String {
    match title.split_once(" - ") {
        Some((short, _)) => short.to_string(),
        None => title.to_string(),
    }
}

/// Split one CSV line into fields, honoring double quotes with `""`
/// escapes. The export step writes minimal quoting, so most fields are
/// bare.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Party Mix,track name,track id
0,0,Dancing Queen,4zJlCJvz,ABBA
1,1,\"Help!, I Need Somebody\",1zHlBJxa,The Beatles
2,2,Yesterday - Remastered 2009,7pJlAJvq,The Beatles
3,3,Yesterday,9qKlZJvr,Some Cover Band
";

    #[test]
    fn test_import_sample_playlist() {
        let playlist = Playlist::from_csv(SAMPLE).unwrap();
        assert_eq!(playlist.name, "Party Mix");
        assert_eq!(playlist.len(), 3);
        assert_eq!(playlist.tracks[0].title, "Dancing Queen");
        assert_eq!(playlist.tracks[0].artist, "ABBA");
    }

    #[test]
    fn test_quoted_title_keeps_comma() {
        let playlist = Playlist::from_csv(SAMPLE).unwrap();
        assert_eq!(playlist.tracks[1].title, "Help!, I Need Somebody");
    }

    #[test]
    fn test_remaster_suffix_is_stripped_and_deduped() {
        let playlist = Playlist::from_csv(SAMPLE).unwrap();
        // "Yesterday - Remastered 2009" shortens to "Yesterday"; the
        // cover with the same shortened title is dropped.
        assert_eq!(playlist.tracks[2].title, "Yesterday");
        assert_eq!(playlist.tracks[2].track_id, "7pJlAJvq");
    }

    #[test]
    fn test_short_title_keeps_inner_hyphen() {
        assert_eq!(short_title("T-N-T"), "T-N-T");
        assert_eq!(short_title("Song - Live at Wembley"), "Song");
    }

    #[test]
    fn test_split_csv_line_with_escaped_quote() {
        let fields = split_csv_line("0,0,\"Say \"\"Hi\"\"\",id,artist");
        assert_eq!(fields[2], "Say \"Hi\"");
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(Playlist::from_csv("").is_err());
        assert!(Playlist::from_csv("\n\n").is_err());
    }

    #[test]
    fn test_malformed_row_is_an_error() {
        let bad = "Party Mix,track name,track id\n0,0,OnlyThreeFields";
        assert!(Playlist::from_csv(bad).is_err());
    }
}

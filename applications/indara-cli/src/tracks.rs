/// Queue sources given on the command line
use crate::error::{CliError, Result};
use indara_playback::Track;
use std::path::Path;

/// Tracks for bare URLs, numbered in argument order
pub fn from_urls(urls: &[String]) -> Vec<Track> {
    urls.iter()
        .enumerate()
        .map(|(i, url)| Track::new(format!("track-{}", i + 1), title_for(url), url.clone()))
        .collect()
}

/// Last path segment without its extension
fn title_for(url: &str) -> String {
    let segment = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(url);

    let stem = segment
        .rsplit_once('.')
        .map_or(segment, |(stem, _)| stem);

    if stem.is_empty() {
        url.to_string()
    } else {
        stem.to_string()
    }
}

/// Read a JSON array of tracks
pub async fn read_queue_file(path: &Path) -> Result<Vec<Track>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Queue built from an optional file followed by URLs
pub async fn collect(urls: &[String], file: Option<&Path>) -> Result<Vec<Track>> {
    let mut tracks = match file {
        Some(path) => read_queue_file(path).await?,
        None => Vec::new(),
    };
    tracks.extend(from_urls(urls));

    if tracks.is_empty() {
        return Err(CliError::Queue(
            "no tracks given (pass URLs or --queue <file>)".to_string(),
        ));
    }
    Ok(tracks)
}

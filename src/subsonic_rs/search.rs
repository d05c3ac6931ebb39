use color_eyre::eyre::Result;
use reqwest::Client;
use serde::Deserialize;

use super::{SubsonicServer, get, string_or_number};

#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicSong {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub artist: String,

    #[serde(default)]
    pub album: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResult2 {
    #[serde(default)]
    pub song: Vec<SubsonicSong>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Search2Body {
    #[serde(rename = "searchResult2", default)]
    pub search_result: Option<SearchResult2>,
}

/// Runs `search2` and returns the matching songs in server relevance order.
///
/// Artists and albums in the result are ignored.
pub async fn search_songs(
    client: &Client,
    server: &SubsonicServer,
    query: &str,
) -> Result<Vec<SubsonicSong>> {
    let body: Search2Body = get(
        client,
        server,
        "search2",
        &[
            ("query", query.to_string()),
            ("artistCount", "0".to_string()),
            ("albumCount", "0".to_string()),
        ],
    )
    .await?;

    Ok(body.search_result.map(|r| r.song).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsonic_rs::SubsonicEnvelope;

    #[test]
    fn test_parse_search2_songs_in_order() {
        let json = r#"{"subsonic-response":{"status":"ok","version":"1.16.1",
            "searchResult2":{"song":[
                {"id":"a1","title":"Bar","artist":"Foo","album":"Baz"},
                {"id":42,"title":"Bar","artist":"Foo Band"}
            ]}}}"#;
        let envelope: SubsonicEnvelope<Search2Body> = serde_json::from_str(json).unwrap();
        let songs = envelope.into_body().unwrap().search_result.unwrap().song;

        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].id, "a1");
        assert_eq!(songs[0].album.as_deref(), Some("Baz"));
        assert_eq!(songs[1].id, "42");
        assert_eq!(songs[1].artist, "Foo Band");
    }

    #[test]
    fn test_parse_search2_without_songs() {
        let json = r#"{"subsonic-response":{"status":"ok","version":"1.16.1","searchResult2":{}}}"#;
        let envelope: SubsonicEnvelope<Search2Body> = serde_json::from_str(json).unwrap();
        let body = envelope.into_body().unwrap();
        assert!(body.search_result.unwrap().song.is_empty());
    }
}

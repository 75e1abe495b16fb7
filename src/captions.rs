use quick_xml::{events::Event, Reader};

/// A downloadable caption resource for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub url: String,
    pub language_code: String,
    pub auto_generated: bool,
}

impl CaptionTrack {
    /// Language code in the `a.<lang>` form used for auto-generated tracks.
    pub fn code(&self) -> String {
        if self.auto_generated {
            format!("a.{}", self.language_code)
        } else {
            self.language_code.clone()
        }
    }

    // Lower is better; None means not English.
    fn rank(&self) -> Option<u8> {
        let lang = self.language_code.as_str();
        match (lang, self.auto_generated) {
            ("en", false) => Some(0),
            ("en", true) => Some(1),
            (l, false) if l.starts_with("en-") => Some(2),
            (l, _) if l.starts_with("en") => Some(3),
            _ => None,
        }
    }
}

/// Picks the preferred English track: manual `en`, then auto `en`, then
/// manual regional variants, then anything else starting with `en`. Ties go
/// to the earliest listed track.
pub fn select_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    tracks
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.rank().map(|r| (r, i, t)))
        .min_by_key(|(r, i, _)| (*r, *i))
        .map(|(_, _, t)| t)
}

/// Resolves the entities caption payloads carry. Cue text is escaped twice,
/// once by the markup and once by the caption service, so `&amp;` is resolved
/// both before and after the others: `&amp;#39;` and `&amp;amp;` both end up
/// as the plain character.
pub fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

fn normalize_cue(raw: &str) -> String {
    decode_entities(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turns a timed-text payload into one line of plain text.
///
/// Both the `<transcript><text>` layout and the `srv3` `<body><p><s>` layout
/// are understood. Each `<text>`/`<p>` element is one cue; cues are joined
/// with single spaces and empty cues are dropped.
pub fn decode_payload(payload: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(payload);
    reader.trim_text(true);

    let mut cues: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                if depth > 0 {
                    depth += 1;
                } else if matches!(e.name().as_ref(), b"text" | b"p") {
                    depth = 1;
                    current.clear();
                }
            }
            Event::End(_) if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let cue = normalize_cue(&current);
                    if !cue.is_empty() {
                        cues.push(cue);
                    }
                }
            }
            Event::Text(e) if depth > 0 => {
                current.push_str(&String::from_utf8_lossy(&e));
                current.push(' ');
            }
            _ => (),
        }
    }

    Ok(cues.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(lang: &str, auto: bool) -> CaptionTrack {
        CaptionTrack {
            url: format!("https://example.test/{}/{}", lang, auto),
            language_code: lang.to_string(),
            auto_generated: auto,
        }
    }

    fn get_test_file(fname: &str) -> String {
        let mut d = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push("resources/test/");
        d.push(fname);
        std::fs::read_to_string(d).expect(format!("Could not read {}", fname).as_str())
    }

    #[test]
    fn track_preference() {
        let tracks = vec![track("de", false), track("en", true), track("en", false)];
        assert_eq!(select_track(&tracks).unwrap().code(), "en");

        let tracks = vec![track("en-GB", false), track("en", true)];
        assert_eq!(select_track(&tracks).unwrap().code(), "a.en");

        let tracks = vec![track("en-US", true), track("en-GB", false), track("en-US", false)];
        assert_eq!(select_track(&tracks).unwrap().language_code, "en-GB");

        let tracks = vec![track("fr", false), track("en-US", true)];
        assert_eq!(select_track(&tracks).unwrap().code(), "a.en-US");

        let tracks = vec![track("fr", false), track("es", true)];
        assert!(select_track(&tracks).is_none());
        assert!(select_track(&[]).is_none());
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("it&#39;s"), "it's");
        assert_eq!(decode_entities("&quot;hi&quot;"), "\"hi\"");
        assert_eq!(decode_entities("a&nbsp;b"), "a b");
        assert_eq!(decode_entities("don&amp;#39;t"), "don't");
        assert_eq!(decode_entities("Tom &amp;amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&amp;quot;hi&amp;quot;"), "\"hi\"");
    }

    #[test]
    fn decode_legacy_layout() {
        let payload = "<?xml version=\"1.0\" encoding=\"utf-8\" ?><transcript>\
            <text start=\"0.5\" dur=\"2\">Tom &amp; Jerry&#39;s</text>\
            <text start=\"2.5\" dur=\"2\">  say\n   &quot;hi&quot;&nbsp;&nbsp;there  </text>\
            <text start=\"4.5\" dur=\"1\">   </text>\
            <text start=\"5.5\" dur=\"1\">\n\nagain\n</text>\
            </transcript>";
        let text = decode_payload(payload).expect("Could not decode payload");
        assert_eq!(text, "Tom & Jerry's say \"hi\" there again");
        assert!(!text.contains("  "));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn decode_double_escaped_cues() {
        let payload = "<transcript>\
            <text start=\"0\" dur=\"1\">Tom &amp;amp; Jerry</text>\
            <text start=\"1\" dur=\"1\">it&amp;#39;s &amp;quot;fine&amp;quot;</text>\
            </transcript>";
        let text = decode_payload(payload).expect("Could not decode payload");
        assert_eq!(text, "Tom & Jerry it's \"fine\"");
    }

    #[test]
    fn decode_srv3_layout() {
        let payload = get_test_file("captions_srv3.xml");
        let text = decode_payload(&payload).expect("Could not decode payload");
        assert_eq!(
            text,
            "Good morning church it's good to be here. Turn with me to John & Acts."
        );
    }

    #[test]
    fn decode_fixture_legacy() {
        let payload = get_test_file("captions_legacy.xml");
        let text = decode_payload(&payload).expect("Could not decode payload");
        assert_eq!(
            text,
            "Let us bow our heads. He said, \"Fear not.\" Amen & amen."
        );
    }

    #[test]
    fn empty_payloads() {
        assert_eq!(decode_payload("<transcript></transcript>").unwrap(), "");
        assert_eq!(decode_payload("").unwrap(), "");
    }

    #[test]
    fn broken_markup_is_an_error() {
        assert!(decode_payload("<transcript><text>hi</p></transcript>").is_err());
    }
}

//! `Accept` header parsing and content negotiation.

use http::HeaderMap;
use http::header::ACCEPT;

#[derive(Clone, Debug, PartialEq)]
struct MediaRange {
    media: String,
    quality: f32,
}

impl MediaRange {
    /// `type/subtype` or `type/*` against a concrete offer; `*/*` matches all.
    fn matches(&self, offer: &str) -> bool {
        if self.media == "*/*" || self.media.eq_ignore_ascii_case(offer) {
            return true;
        }
        match self.media.strip_suffix("/*") {
            Some(kind) => offer
                .split_once('/')
                .is_some_and(|(offer_kind, _)| offer_kind.eq_ignore_ascii_case(kind)),
            None => false,
        }
    }
}

/// Media ranges a client accepts, in declaration order.
///
/// ```rust
/// use tsuki::accept::Accept;
///
/// let accept = Accept::parse_value("text/html;q=0.5, application/json");
/// assert_eq!(accept.order(), vec!["application/json", "text/html"]);
/// assert_eq!(accept.negotiate(&["text/html", "application/json"]), Some("application/json"));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Accept {
    ranges: Vec<MediaRange>,
}

impl Accept {
    /// Collects every `Accept` header in `headers`.
    pub fn parse(headers: &HeaderMap) -> Self {
        let ranges = headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(parse_ranges)
            .collect();
        Self { ranges }
    }

    pub fn parse_value(value: &str) -> Self {
        Self { ranges: parse_ranges(value).collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn accepts(&self, media: &str) -> bool {
        self.quality(media) > 0.0
    }

    /// Quality of the first range matching `media`, `0` if none does.
    pub fn quality(&self, media: &str) -> f32 {
        self.ranges
            .iter()
            .find(|range| range.matches(media))
            .map_or(0.0, |range| range.quality)
    }

    /// Media ranges by descending quality. Equal qualities keep declaration
    /// order.
    pub fn order(&self) -> Vec<&str> {
        let mut ranges: Vec<&MediaRange> = self.ranges.iter().collect();
        // `sort_by` is stable.
        ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));
        ranges.into_iter().map(|range| range.media.as_str()).collect()
    }

    /// Picks the offer for the most preferred acceptable range.
    ///
    /// Ranges are tried by [`order`](Accept::order); within one range (e.g. a
    /// wildcard) the first matching entry of `offers` wins. Ranges with
    /// `q=0` never match.
    pub fn negotiate<'a>(&self, offers: &[&'a str]) -> Option<&'a str> {
        let mut ranges: Vec<&MediaRange> = self.ranges.iter().filter(|r| r.quality > 0.0).collect();
        ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));

        ranges
            .into_iter()
            .find_map(|range| offers.iter().copied().find(|offer| range.matches(offer)))
    }
}

fn parse_ranges(value: &str) -> impl Iterator<Item = MediaRange> + '_ {
    value.split(',').filter_map(|entry| {
        let mut params = entry.split(';');
        let media = params.next()?.trim().to_ascii_lowercase();
        if !media.contains('/') {
            return None;
        }

        let quality = params
            .filter_map(|param| param.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("q"))
            .and_then(|(_, q)| q.trim().parse::<f32>().ok())
            .map_or(1.0, |q| q.clamp(0.0, 1.0));

        Some(MediaRange { media, quality })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_quality_to_one() {
        let accept = Accept::parse_value("application/json");
        assert_eq!(accept.quality("application/json"), 1.0);
        assert_eq!(accept.quality("text/plain"), 0.0);
    }

    #[test]
    fn skips_malformed_entries() {
        let accept = Accept::parse_value("garbage, , text/plain;q=abc");
        assert_eq!(accept.order(), vec!["text/plain"]);
        assert_eq!(accept.quality("text/plain"), 1.0);
    }

    #[test]
    fn equal_quality_keeps_declaration_order() {
        let accept = Accept::parse_value("application/json;q=0.8, application/problem+json;q=0.8");

        assert_eq!(accept.order(), vec!["application/json", "application/problem+json"]);
        assert_eq!(
            accept.negotiate(&["application/problem+json", "application/json"]),
            Some("application/json"),
        );
    }

    #[test]
    fn higher_quality_wins() {
        let accept = Accept::parse_value("application/json;q=0.2, text/plain;q=0.9");
        assert_eq!(accept.negotiate(&["application/json", "text/plain"]), Some("text/plain"));
    }

    #[test]
    fn wildcards() {
        let accept = Accept::parse_value("application/*");
        assert!(accept.accepts("application/problem+json"));
        assert!(!accept.accepts("text/plain"));

        let any = Accept::parse_value("*/*;q=0.1");
        assert_eq!(any.negotiate(&["text/plain", "application/json"]), Some("text/plain"));
    }

    #[test]
    fn zero_quality_is_not_acceptable() {
        let accept = Accept::parse_value("application/json;q=0");
        assert!(!accept.accepts("application/json"));
        assert_eq!(accept.negotiate(&["application/json"]), None);
    }

    #[test]
    fn reads_every_accept_header() {
        let mut headers = HeaderMap::new();
        headers.append(ACCEPT, "text/plain;q=0.5".parse().unwrap());
        headers.append(ACCEPT, "application/json".parse().unwrap());

        assert_eq!(Accept::parse(&headers).order(), vec!["application/json", "text/plain"]);
    }
}

/// Home page listing: search filter plus tab ordering
use crate::models::Video;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordering tabs on the home page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedTab {
    #[default]
    Recommended,
    Trending,
    Recent,
}

impl FromStr for FeedTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recommended" | "for-you" => Ok(FeedTab::Recommended),
            "trending" | "popular" => Ok(FeedTab::Trending),
            "recent" | "latest" | "new" => Ok(FeedTab::Recent),
            other => Err(format!("Unknown feed tab '{}'", other)),
        }
    }
}

impl FeedTab {
    /// Heading shown above an unfiltered listing
    pub fn title(self) -> &'static str {
        match self {
            FeedTab::Recommended => "Recommended for you",
            FeedTab::Trending => "Trending now",
            FeedTab::Recent => "Recently uploaded",
        }
    }
}

impl fmt::Display for FeedTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedTab::Recommended => "recommended",
            FeedTab::Trending => "trending",
            FeedTab::Recent => "recent",
        };
        f.write_str(name)
    }
}

/// Blend of popularity and freshness used by the recommended tab
pub fn recommendation_score(video: &Video) -> f64 {
    let freshness = video.created_at.timestamp_millis() as f64 / 1_000_000.0;
    video.views as f64 * 0.7 + freshness * 0.3
}

/// A filtered, ordered page of videos
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub query: Option<String>,
    pub tab: FeedTab,
    pub videos: Vec<Video>,
}

impl Listing {
    pub fn build(videos: Vec<Video>, query: Option<&str>, tab: FeedTab) -> Self {
        let query = query.map(str::trim).filter(|q| !q.is_empty()).map(str::to_string);

        let mut videos: Vec<Video> = match &query {
            Some(q) => videos.into_iter().filter(|v| v.matches_query(q)).collect(),
            None => videos,
        };

        match tab {
            FeedTab::Recommended => videos.sort_by(|a, b| {
                recommendation_score(b).total_cmp(&recommendation_score(a))
            }),
            FeedTab::Trending => videos.sort_by(|a, b| b.views.cmp(&a.views)),
            FeedTab::Recent => videos.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        Self { query, tab, videos }
    }

    pub fn result_count(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn heading(&self) -> String {
        match &self.query {
            Some(q) => format!("Search results for \"{}\"", q),
            None => self.tab.title().to_string(),
        }
    }

    pub fn summary(&self) -> String {
        match self.result_count() {
            1 => "1 video".to_string(),
            n => format!("{} videos", n),
        }
    }

    pub fn empty_message(&self) -> &'static str {
        if self.query.is_some() {
            "No videos match your search"
        } else {
            "No videos yet"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn video(id: &str, title: &str, views: u64, age_days: i64) -> Video {
        Video {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            category: "Music".to_string(),
            video_url: "https://youtu.be/x".to_string(),
            thumbnail_url: None,
            user_id: None,
            uploaded_by: None,
            views,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    fn ids(listing: &Listing) -> Vec<&str> {
        listing.videos.iter().map(|v| v.id.as_str()).collect()
    }

    #[test]
    fn test_empty_listing_reports_zero() {
        let listing = Listing::build(Vec::new(), None, FeedTab::Recommended);
        assert_eq!(listing.result_count(), 0);
        assert!(listing.is_empty());
        assert_eq!(listing.summary(), "0 videos");
        assert_eq!(listing.empty_message(), "No videos yet");
    }

    #[test]
    fn test_tab_orderings() {
        let videos = vec![
            video("old-popular", "a", 1_000_000, 300),
            video("new-quiet", "b", 3, 0),
            video("mid", "c", 500, 10),
        ];

        let trending = Listing::build(videos.clone(), None, FeedTab::Trending);
        assert_eq!(ids(&trending), vec!["old-popular", "mid", "new-quiet"]);

        let recent = Listing::build(videos.clone(), None, FeedTab::Recent);
        assert_eq!(ids(&recent), vec!["new-quiet", "mid", "old-popular"]);

        let recommended = Listing::build(videos, None, FeedTab::Recommended);
        assert_eq!(recommended.videos.len(), 3);
        let scores: Vec<f64> = recommended.videos.iter().map(recommendation_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_search_filters_and_blank_query_is_ignored() {
        let videos = vec![video("1", "Jazz piano", 1, 1), video("2", "Drum lesson", 1, 1)];

        let listing = Listing::build(videos.clone(), Some("piano"), FeedTab::Recent);
        assert_eq!(ids(&listing), vec!["1"]);
        assert_eq!(listing.heading(), "Search results for \"piano\"");
        assert_eq!(listing.summary(), "1 video");

        let listing = Listing::build(videos.clone(), Some("   "), FeedTab::Recent);
        assert!(listing.query.is_none());
        assert_eq!(listing.result_count(), 2);

        let listing = Listing::build(videos, Some("violin"), FeedTab::Recent);
        assert!(listing.is_empty());
        assert_eq!(listing.empty_message(), "No videos match your search");
    }

    #[test]
    fn test_heading_follows_tab() {
        let videos = vec![video("1", "Jazz piano", 1, 1)];
        let heading = |tab| Listing::build(videos.clone(), None, tab).heading();
        assert_eq!(heading(FeedTab::Recommended), "Recommended for you");
        assert_eq!(heading(FeedTab::Trending), "Trending now");
        assert_eq!(heading(FeedTab::Recent), "Recently uploaded");

        let search = Listing::build(videos.clone(), Some("jazz"), FeedTab::Trending);
        assert_eq!(search.heading(), "Search results for \"jazz\"");
    }

    #[test]
    fn test_tab_parsing() {
        assert_eq!("Trending".parse::<FeedTab>().unwrap(), FeedTab::Trending);
        assert_eq!("latest".parse::<FeedTab>().unwrap(), FeedTab::Recent);
        assert!("sideways".parse::<FeedTab>().is_err());
        assert_eq!(FeedTab::default().to_string(), "recommended");
    }
}

//! Social media size presets.
//!
//! Applying a preset fills the target box and centre-crops the overflow, so
//! the output is always exactly the preset size.

use crate::imaging::Operation;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SocialPreset {
    /// Lookup key, e.g. `instagram-square`.
    pub slug: &'static str,
    pub name: &'static str,
    pub platform: &'static str,
    pub width: u32,
    pub height: u32,
}

impl SocialPreset {
    pub fn operation(&self) -> Operation {
        Operation::Cover {
            width: self.width,
            height: self.height,
        }
    }

    /// Reduced aspect ratio, e.g. `16:9`.
    pub fn aspect_ratio(&self) -> String {
        fn gcd(a: u32, b: u32) -> u32 {
            if b == 0 { a } else { gcd(b, a % b) }
        }
        let d = gcd(self.width, self.height).max(1);
        format!("{}:{}", self.width / d, self.height / d)
    }
}

const fn preset(
    slug: &'static str,
    name: &'static str,
    platform: &'static str,
    width: u32,
    height: u32,
) -> SocialPreset {
    SocialPreset {
        slug,
        name,
        platform,
        width,
        height,
    }
}

pub const PRESETS: &[SocialPreset] = &[
    preset("instagram-square", "Square Post", "Instagram", 1080, 1080),
    preset("instagram-portrait", "Portrait Post", "Instagram", 1080, 1350),
    preset("instagram-story", "Story", "Instagram", 1080, 1920),
    preset("facebook-post", "Post", "Facebook", 1200, 630),
    preset("facebook-cover", "Cover Photo", "Facebook", 820, 312),
    preset("twitter-post", "Post", "X (Twitter)", 1200, 675),
    preset("twitter-header", "Header", "X (Twitter)", 1500, 500),
    preset("linkedin-post", "Post", "LinkedIn", 1200, 627),
    preset("youtube-thumbnail", "Thumbnail", "YouTube", 1280, 720),
    preset("pinterest-pin", "Pin", "Pinterest", 1000, 1500),
];

/// Case-insensitive lookup by slug.
pub fn find_preset(slug: &str) -> Option<&'static SocialPreset> {
    PRESETS.iter().find(|p| p.slug.eq_ignore_ascii_case(slug.trim()))
}

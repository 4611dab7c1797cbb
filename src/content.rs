//! Static copy served to the post-flush screens. Rendering and navigation
//! are shell concerns; the text lives in the core so every platform shows
//! the same words.

pub const MOTIVATIONAL_QUOTES: &[&str] = &[
    "This too shall pass.",
    "Breathe deeply. You are stronger than your anger.",
    "Let go and live freely.",
    "The best way out is always through.",
    "Every moment is a fresh beginning.",
];

/// Things to try while still angry.
pub const COPING_SUGGESTIONS: &[&str] = &[
    "Take 10 deep breaths, in through your nose and out through your mouth.",
    "Go for a brisk 15-minute walk to clear your head.",
    "Call or text a friend you trust and talk about it.",
    "Write down everything you are feeling, without judgment.",
    "Listen to a calming playlist or a guided meditation.",
    "Count quietly to ten before reacting.",
    "Try gentle stretches or yoga for relaxation.",
    "Imagine a peaceful place or memory.",
    "Use a little humor to lighten up the mood.",
    "Forgive and let go; don't hold a grudge.",
];

/// Things to avoid while still angry.
pub const COPING_AVOIDANCES: &[&str] = &[
    "Don't raise your voice or shout at others.",
    "Don't keep your feelings bottled up inside.",
    "Don't make any big decisions while you are emotional.",
    "Avoid turning to unhealthy coping mechanisms.",
    "Don't dwell on the anger; seek a constructive outlet.",
];

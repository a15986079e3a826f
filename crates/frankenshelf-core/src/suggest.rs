//! Suggested search terms for the zero-match screen.
//!
//! The catalog service only answers a fixed vocabulary of queries; anything
//! outside it settles with zero matches. When that happens the presentation
//! offers a couple of known-good terms to try instead.

use rand::Rng;
use rand::seq::IndexedRandom;

/// Queries the catalog service is known to answer.
pub const SEARCH_TERMS: &[&str] = &[
    "Android",
    "Art",
    "Artificial Intelligence",
    "Astronomy",
    "Austen",
    "Baseball",
    "Basketball",
    "Bhagat",
    "Biography",
    "Brief",
    "Business",
    "Camus",
    "Cervantes",
    "Christie",
    "Classics",
    "Comics",
    "Cook",
    "Cricket",
    "Cycling",
    "Desai",
    "Design",
    "Development",
    "Digital Marketing",
    "Drama",
    "Drawing",
    "Dumas",
    "Education",
    "Everything",
    "Fantasy",
    "Film",
    "Finance",
    "First",
    "Fitness",
    "Football",
    "Future",
    "Games",
    "Gandhi",
    "Homer",
    "Horror",
    "Hugo",
    "Ibsen",
    "Journey",
    "Kafka",
    "King",
    "Lahiri",
    "Larsson",
    "Learn",
    "Literary Fiction",
    "Make",
    "Manage",
    "Marquez",
    "Money",
    "Mystery",
    "Negotiate",
    "Painting",
    "Philosophy",
    "Photography",
    "Poetry",
    "Production",
    "Programming",
    "React",
    "Redux",
    "River",
    "Robotics",
    "Rowling",
    "Satire",
    "Science Fiction",
    "Shakespeare",
    "Singh",
    "Swimming",
    "Tale",
    "Thrun",
    "Time",
    "Tolstoy",
    "Travel",
    "Ultimate",
    "Virtual Reality",
    "Web Development",
    "iOS",
];

/// Two distinct suggested terms, drawn with `rng`.
///
/// Deterministic under a seeded rng.
pub fn suggested_pair_with<R: Rng + ?Sized>(rng: &mut R) -> [&'static str; 2] {
    let picks: Vec<&'static str> = SEARCH_TERMS.choose_multiple(rng, 2).copied().collect();
    [picks[0], picks[1]]
}

/// Two distinct suggested terms from the thread-local rng.
#[must_use]
pub fn suggested_pair() -> [&'static str; 2] {
    suggested_pair_with(&mut rand::rng())
}

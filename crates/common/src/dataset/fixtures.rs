//! Small snapshots with known shapes, shared by unit tests across the crate

use super::{Affiliation, Author, Citation, Dataset, Paper};

/// Three papers: years [2020, 2021, null], citations [5, 0, 10]
pub fn three_papers() -> Dataset {
    Dataset::from_tables(
        vec![
            Paper::new("p1", Some(2020), 5, 1),
            Paper::new("p2", Some(2021), 0, 0),
            Paper::new("p3", None, 10, 2),
        ],
        vec![],
        vec![],
        vec![],
    )
}

/// Seven papers, five authors, known co-authorship overlaps.
///
/// | paper | year | cites | patents | authors    |
/// |-------|------|-------|---------|------------|
/// | p1    | 2019 | 12    | 2       | a1 a2      |
/// | p2    | 2020 | 8     | 0       | a1 a2 a3   |
/// | p3    | 2020 | 8     | 1       | a3         |
/// | p4    | 2021 | 0     | 0       | a4         |
/// | p5    | 2021 | 3     | 3       | a1 a4      |
/// | p6    | null | 20    | 0       | a2         |
/// | p7    | 2022 | 1     | 0       |            |
///
/// a5 has no papers. a1 carries a stored h-index of 9.
/// Citations: p2->p1, p3->p1, p3->p2, p5->p4, p7->p6, p7->p7, p1->p99 (dangling).
pub fn sample() -> Dataset {
    let papers = vec![
        Paper::new("p1", Some(2019), 12, 2).with_title("Deep Graph Learning"),
        Paper::new("p2", Some(2020), 8, 0).with_title("Scalable Message Passing"),
        Paper::new("p3", Some(2020), 8, 1),
        Paper::new("p4", Some(2021), 0, 0),
        Paper::new("p5", Some(2021), 3, 3),
        Paper::new("p6", None, 20, 0),
        Paper::new("p7", Some(2022), 1, 0),
    ];

    let references = vec![
        Citation::new("p2", "p1"),
        Citation::new("p3", "p1"),
        Citation::new("p3", "p2"),
        Citation::new("p5", "p4"),
        Citation::new("p7", "p6"),
        Citation::new("p7", "p7"),
        Citation::new("p1", "p99"),
    ];

    let mut a1 = Author::new("a1", "Ada Lovelace").with_h_index(9.0);
    a1.productivity = Some(0.5);
    let mut a4 = Author::new("a4", "Edsger Dijkstra");
    a4.productivity = Some(1.5);
    let authors = vec![
        a1,
        Author::new("a2", "Alan Turing"),
        Author::new("a3", "Grace Hopper"),
        a4,
        Author::new("a5", "Barbara Liskov"),
    ];

    let affiliations = [
        ("p1", "a1"),
        ("p1", "a2"),
        ("p2", "a1"),
        ("p2", "a2"),
        ("p2", "a3"),
        ("p3", "a3"),
        ("p4", "a4"),
        ("p5", "a1"),
        ("p5", "a4"),
        ("p6", "a2"),
    ]
    .into_iter()
    .map(|(p, a)| Affiliation::new(p, a))
    .collect();

    Dataset::from_tables(papers, references, authors, affiliations)
}

pub fn empty() -> Dataset {
    Dataset::from_tables(vec![], vec![], vec![], vec![])
}

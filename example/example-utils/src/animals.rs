use sessionflow::api::element::Element;

/// `(kind, animal)` pairs, all at the same instant so each kind forms a single session.
pub fn animal_elements() -> Vec<Element<String, String>> {
    let pairs = [
        ("Mammal", "Dog"),
        ("Mammal", "Cat"),
        ("Fish", "Salmon"),
        ("Amphibian", "Snake"),
        ("Bird", "Eagle"),
        ("Bird", "Owl"),
        ("Mammal", "Algo"),
    ];

    pairs
        .iter()
        .map(|(kind, animal)| Element::new(kind.to_string(), animal.to_string(), 0))
        .collect()
}

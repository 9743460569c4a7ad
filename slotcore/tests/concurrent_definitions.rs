mod common;

use std::{sync::Arc, thread};

use common::{define_with_init, define_with_super_init};
use slotcore::registry::TypeRegistry;

#[test]
fn types_can_be_defined_from_several_threads() {
    let registry = Arc::new(TypeRegistry::default());
    let base = define_with_init(&registry, "Base", &[registry.dual_base()], &["id"]);

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let mut parent = base;
                for depth in 0..16 {
                    let name = format!("W{}D{}", worker, depth);
                    let field = format!("f{}_{}", worker, depth);
                    parent =
                        define_with_super_init(&registry, &name, &[parent], &[field.as_str()]);
                }
                parent
            })
        })
        .collect();

    let leaves: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker panicked"))
        .collect();

    for (worker, leaf) in leaves.into_iter().enumerate() {
        let slots = registry.effective_slots(leaf).unwrap();
        assert_eq!(slots.len(), 17);
        assert!(slots.contains("id"));
        assert!(slots.contains(&format!("f{}_15", worker)));

        let carriers = registry
            .ancestors(leaf)
            .unwrap()
            .into_iter()
            .chain([leaf])
            .filter(|t| registry.get(*t).unwrap().layout.dynamic_store)
            .collect::<Vec<_>>();
        assert_eq!(carriers, [base]);
    }

    assert_eq!(registry.hierarchy().len(), 3 + 1 + 8 * 16);
}

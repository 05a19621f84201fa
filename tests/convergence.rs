use entangle::{Atom, Entanglement, PairState, Runtime};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Write {
    Registry(i16),
    Store(i16),
}

fn write_strategy() -> impl Strategy<Value = Write> {
    prop_oneof![
        any::<i16>().prop_map(Write::Registry),
        any::<i16>().prop_map(Write::Store),
        // Small values make repeated (echo) writes likely.
        (0i16..3).prop_map(Write::Registry),
        (0i16..3).prop_map(Write::Store),
    ]
}

proptest! {
    #[test]
    fn both_sides_agree_after_every_write(seed in any::<i16>(), writes in prop::collection::vec(write_strategy(), 1..64)) {
        let runtime = Runtime::new();
        let atom = Atom::new(seed);
        let pair = Entanglement::new(&atom, "prop").establish(&runtime).unwrap();

        for write in writes {
            let expected = match write {
                Write::Registry(value) => {
                    runtime.registry().set(pair.atom(), value).unwrap();
                    value
                }
                Write::Store(value) => {
                    runtime.store().set(&atom, value).unwrap();
                    value
                }
            };
            prop_assert_eq!(runtime.store().get(&atom).unwrap(), expected);
            prop_assert_eq!(runtime.registry().get(pair.atom()).unwrap(), expected);
            prop_assert_eq!(pair.shadows(), (expected, expected));
            prop_assert_eq!(pair.state(), PairState::Idle);
        }
    }

    #[test]
    fn store_writes_only_count_genuine_changes(values in prop::collection::vec(0u8..4, 1..32)) {
        let runtime = Runtime::new();
        let atom = Atom::new(0u8);
        let pair = Entanglement::new(&atom, "changes").establish(&runtime).unwrap();

        let mut current = 0u8;
        let mut changes = 0u64;
        for value in values {
            if value != current {
                changes += 1;
                current = value;
            }
            runtime.registry().set(pair.atom(), value).unwrap();
        }
        prop_assert_eq!(runtime.store().version(&atom), changes);
    }
}

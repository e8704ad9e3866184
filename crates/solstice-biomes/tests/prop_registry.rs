use proptest::prelude::*;
use solstice_biomes::{BiomeRegistry, FamilyRules, Family};

fn biome_name() -> impl Strategy<Value = String> {
    "[A-Z][A-Z_]{0,15}"
}

proptest! {
    // Interning is stable: every registered name maps back to itself.
    #[test]
    fn register_then_lookup_roundtrips(names in prop::collection::vec(biome_name(), 1..40)) {
        let mut reg = BiomeRegistry::new();
        let ids: Vec<_> = names.iter().map(|n| reg.register(n)).collect();
        for (name, id) in names.iter().zip(ids.iter()) {
            prop_assert_eq!(reg.id_by_name(name), Some(*id));
            prop_assert_eq!(reg.name(*id), Some(name.as_str()));
            prop_assert_eq!(reg.id_by_name(&name.to_ascii_lowercase()), Some(*id));
        }
        prop_assert!(reg.len() <= names.len());
    }

    // Deep and shallow variants are inverse whenever both names exist.
    #[test]
    fn deep_and_shallow_are_inverse(base in "[A-Z]{1,8}_OCEAN") {
        let mut reg = BiomeRegistry::new();
        let shallow = reg.register(&base);
        let deep = reg.register(&format!("DEEP_{base}"));
        prop_assert_eq!(reg.deep_variant(shallow), Some(deep));
        prop_assert_eq!(reg.shallow_variant(deep), Some(shallow));
        prop_assert!(reg.is_deep_ocean(deep));
        prop_assert!(!reg.is_deep_ocean(shallow));
    }

    // Any sequence containing an ocean sample classifies as ocean.
    #[test]
    fn ocean_anywhere_wins_over_land(prefix in 0usize..8, suffix in 0usize..8) {
        let reg = BiomeRegistry::vanilla();
        let plains = reg.id_by_name("PLAINS").unwrap();
        let ocean = reg.id_by_name("COLD_OCEAN").unwrap();
        let mut samples = vec![plains; prefix];
        samples.push(ocean);
        samples.extend(std::iter::repeat_n(plains, suffix));
        prop_assert_eq!(FamilyRules::default().classify(&reg, samples), Family::Ocean);
    }
}

use proptest::prelude::*;
use wilayah_code::{
    derive, DistrictFields, Level, ProvinceFields, RawProperties, RegencyFields, RegionCode,
    VillageFields,
};

fn digits(min: usize, max: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[0-9]{{{min},{max}}}")).unwrap()
}

fn village(prov: &str, kab: &str, kec: &str, desa: &str) -> RawProperties {
    RawProperties::Village(VillageFields {
        kode_prov: Some(prov.to_string()),
        kode_kab: Some(kab.to_string()),
        kode_kec: Some(kec.to_string()),
        kode_desa: Some(desa.to_string()),
        desa: Some("Desa".to_string()),
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn district_segment_is_last_two_characters(
        prov in digits(2, 2),
        kab in digits(2, 2),
        padding in digits(0, 6),
        tail in digits(2, 2),
    ) {
        let raw = RawProperties::District(DistrictFields {
            kode_prov: Some(prov.clone()),
            kode_kab: Some(kab.clone()),
            kode_kec: Some(format!("{padding}{tail}")),
            kecamatan: Some("Kec".to_string()),
        });
        let region = derive(&raw).unwrap();
        prop_assert_eq!(region.code.as_str(), format!("{prov}.{kab}.{tail}"));
        prop_assert_eq!(region.code.level(), Some(Level::District));
    }

    #[test]
    fn village_segment_starts_with_two(
        kec in digits(2, 6),
        desa in digits(1, 4),
    ) {
        let region = derive(&village("11", "01", &kec, &desa)).unwrap();
        let leaf = region.code.segments().last().unwrap().to_string();
        prop_assert!(leaf.starts_with('2'));
        prop_assert_eq!(&leaf[1..], desa.as_str());
        prop_assert_eq!(region.code.depth(), 4);
    }

    #[test]
    fn derived_code_has_one_segment_per_level(
        prov in digits(1, 3),
        kab in digits(1, 3),
        kec in digits(2, 5),
        desa in digits(1, 4),
    ) {
        let all = [
            RawProperties::Province(ProvinceFields {
                kode_prov: Some(prov.clone()),
                provinsi: None,
            }),
            RawProperties::Regency(RegencyFields {
                kode_prov: Some(prov.clone()),
                kode_kab: Some(kab.clone()),
                kabupaten: None,
            }),
            RawProperties::District(DistrictFields {
                kode_prov: Some(prov.clone()),
                kode_kab: Some(kab.clone()),
                kode_kec: Some(kec.clone()),
                kecamatan: None,
            }),
            village(&prov, &kab, &kec, &desa),
        ];
        let mut previous: Option<RegionCode> = None;
        for raw in &all {
            let region = derive(raw).unwrap();
            prop_assert_eq!(region.code.depth(), region.level.segments());
            if let Some(parent) = &previous {
                prop_assert!(parent.is_ancestor_of(&region.code));
            }
            previous = Some(region.code);
        }
    }

    #[test]
    fn derivation_is_deterministic(kec in digits(2, 6), desa in digits(1, 4)) {
        let raw = village("32", "04", &kec, &desa);
        prop_assert_eq!(derive(&raw).unwrap(), derive(&raw.clone()).unwrap());
    }

    #[test]
    fn descendant_prefix_never_matches_sibling_extensions(
        base in digits(1, 3),
        extra in digits(1, 2),
        rest in digits(1, 3),
    ) {
        let parent = RegionCode::parse(&format!("11.{base}")).unwrap();
        let sibling = RegionCode::parse(&format!("11.{base}{extra}")).unwrap();
        let child = RegionCode::parse(&format!("11.{base}.{rest}")).unwrap();
        prop_assert!(!parent.is_ancestor_of(&sibling));
        prop_assert!(parent.is_ancestor_of(&child));
    }
}

use super::*;

const ALL: [Ease; 7] = [
    Ease::Linear,
    Ease::InQuad,
    Ease::OutQuad,
    Ease::InOutQuad,
    Ease::InCubic,
    Ease::OutCubic,
    Ease::InOutCubic,
];

#[test]
fn endpoints_are_fixed() {
    for e in ALL {
        assert!((e.apply(0.0) - 0.0).abs() < 1e-12, "{e:?}");
        assert!((e.apply(1.0) - 1.0).abs() < 1e-12, "{e:?}");
    }
}

#[test]
fn curves_are_monotonic() {
    for e in ALL {
        let mut prev = e.apply(0.0);
        for i in 1..=100 {
            let v = e.apply(f64::from(i) / 100.0);
            assert!(v + 1e-12 >= prev, "{e:?} not monotonic at {i}");
            prev = v;
        }
    }
}

#[test]
fn input_is_clamped() {
    assert_eq!(Ease::InQuad.apply(-3.0), 0.0);
    assert_eq!(Ease::OutCubic.apply(7.0), 1.0);
}

#[test]
fn midpoints_match_closed_forms() {
    assert!((Ease::InQuad.apply(0.5) - 0.25).abs() < 1e-12);
    assert!((Ease::OutQuad.apply(0.5) - 0.75).abs() < 1e-12);
    assert!((Ease::InOutQuad.apply(0.75) - 0.875).abs() < 1e-12);
    assert!((Ease::InCubic.apply(0.5) - 0.125).abs() < 1e-12);
    assert!((Ease::InOutCubic.apply(0.5) - 0.5).abs() < 1e-12);
}

#[test]
fn custom_curve_receives_clamped_progress() {
    fn step(t: f64) -> f64 {
        if t < 0.5 { 0.0 } else { 1.0 }
    }
    let e = Ease::Custom(step);
    assert_eq!(e.apply(0.4), 0.0);
    assert_eq!(e.apply(2.0), 1.0);
}

#[test]
fn names_parse_in_both_spellings() {
    let a: Ease = serde_json::from_str("\"in_out_cubic\"").unwrap();
    let b: Ease = serde_json::from_str("\"easeInOutCubic\"").unwrap();
    assert!(matches!(a, Ease::InOutCubic));
    assert!(matches!(b, Ease::InOutCubic));
    assert!(matches!(Ease::default(), Ease::Linear));
}

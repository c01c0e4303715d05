use crate::core::{KernelError, MessageKind};
use crate::library::{SIGNAL_CONSTANT, SIGNAL_LOOKUP_1D};
use crate::util::LookupTable;

use super::{drain_of, has_message, new_model};

#[test]
fn parses_and_interpolates_a_1d_table() {
    let t = LookupTable::parse_1d("0,0; 1,10; 3,30").unwrap();
    assert_eq!(t.dimensions(), 1);
    assert_eq!(t.axis(0).unwrap(), &[0.0, 1.0, 3.0]);
    assert!((t.interpolate_1d(0.5) - 5.0).abs() < 1e-12);
    assert!((t.interpolate_1d(2.0) - 20.0).abs() < 1e-12);
    assert_eq!(t.interpolate_1d(1.0), 10.0);
}

#[test]
fn values_outside_the_index_are_clamped() {
    let t = LookupTable::new_1d(vec![1.0, 2.0], vec![5.0, 7.0]).unwrap();
    assert_eq!(t.interpolate_1d(-100.0), 5.0);
    assert_eq!(t.interpolate_1d(100.0), 7.0);
}

#[test]
fn malformed_tables_are_rejected() {
    assert!(matches!(
        LookupTable::parse_1d("0,0;1"),
        Err(KernelError::Parameter { .. })
    ));
    assert!(matches!(
        LookupTable::parse_1d("0,zero"),
        Err(KernelError::Parameter { .. })
    ));
    assert!(LookupTable::new_1d(vec![0.0, 1.0], vec![1.0]).is_err());
    assert!(LookupTable::new(vec![], vec![]).is_err());
}

#[test]
fn sort_keeps_pairs_together() {
    let mut t = LookupTable::new_1d(vec![3.0, 1.0, 2.0], vec![30.0, 10.0, 20.0]).unwrap();
    assert!(!t.is_ascending());
    t.sort().unwrap();
    assert!(t.is_ascending());
    assert_eq!(t.axis(0).unwrap(), &[1.0, 2.0, 3.0]);
    assert_eq!(t.data(), &[10.0, 20.0, 30.0]);

    t.reverse().unwrap();
    assert_eq!(t.axis(0).unwrap(), &[3.0, 2.0, 1.0]);
    assert_eq!(t.data(), &[30.0, 20.0, 10.0]);
}

#[test]
fn multi_dimensional_tables_interpolate_but_do_not_sort() {
    // f(x, y) = 2x + y
    let mut t = LookupTable::new(vec![vec![0.0, 1.0], vec![0.0, 1.0]], vec![0.0, 1.0, 2.0, 3.0]).unwrap();
    assert_eq!(t.dimensions(), 2);
    assert!((t.interpolate(&[0.5, 0.5]) - 1.5).abs() < 1e-12);
    assert!((t.interpolate(&[0.25, 1.0]) - 1.5).abs() < 1e-12);
    assert_eq!(t.interpolate(&[2.0, 2.0]), 3.0);

    assert!(matches!(t.sort(), Err(KernelError::Unsupported(_))));
    assert!(matches!(t.reverse(), Err(KernelError::Unsupported(_))));
}

#[test]
fn lookup_component_sorts_an_unordered_table_with_a_warning() {
    let mut m = new_model("Lookup");
    let root = m.root();
    let k = m.add_component(root, SIGNAL_CONSTANT, "Key").unwrap();
    let l = m.add_component(root, SIGNAL_LOOKUP_1D, "Lookup").unwrap();
    m.set_parameter_value(k, "y", "1.5").unwrap();
    m.set_parameter_value(l, "table", "2,20;0,0;1,10").unwrap();
    m.connect(k, "out", l, "in").unwrap();

    assert!(m.initialize(0.0, 0.002));
    let warnings = drain_of(&m, MessageKind::Warning);
    assert!(has_message(&warnings, "Lookup: lookup index is not strictly increasing"));

    assert!(m.simulate(0.002));
    assert!((m.read_node_safe(l, "out", 0).unwrap() - 15.0).abs() < 1e-12);
}

#[test]
fn lookup_component_with_a_bad_table_fails_to_initialize() {
    let mut m = new_model("BadLookup");
    let root = m.root();
    let l = m.add_component(root, SIGNAL_LOOKUP_1D, "Lookup").unwrap();
    m.set_parameter_value(l, "table", "0,0;x,1").unwrap();
    assert!(!m.initialize(0.0, 0.01));
    let errors = drain_of(&m, MessageKind::Error);
    assert!(has_message(&errors, "component Lookup failed to initialize"));
}

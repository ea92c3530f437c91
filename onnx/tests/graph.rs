use tensil_onnx::prelude::*;

fn f32(shape: &[i64]) -> TensorType {
    TensorType::ranked(DatumType::F32, shape)
}

fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("TENSIL_LOG").try_init();
}

#[test]
fn concat_einsum_split_chain() {
    setup_test_logger();
    let mut g = Graph::default();
    let a = g.add_source(f32(&[2, 3]));
    let b = g.add_source(f32(&[2, 5]));
    let w = g.add_source(f32(&[8, DYNAMIC]));
    let cat = g.wire_node("cat", Concat::new(-1), &[a, b]).unwrap()[0];
    let mm = g.wire_node("mm", Einsum::new("ij,jk->ik".into()), &[cat, w]).unwrap()[0];
    let sizes = g.add_const(DatumType::I64, &[1, 1]);
    let parts = g.wire_node("split", Split::new(0, 2), &[mm, sizes]).unwrap();

    let passes = g.analyse(&InferenceConfig::default()).unwrap();
    assert_eq!(passes, 2);
    assert_eq!(g.value_type(cat).unwrap(), &f32(&[2, 8]));
    assert_eq!(g.value_type(mm).unwrap(), &f32(&[2, DYNAMIC]));
    assert_eq!(g.value_type(parts[1]).unwrap(), &f32(&[1, DYNAMIC]));
    assert_eq!(g.node_by_name("cat").unwrap().op_as::<Concat>().unwrap().axis, 1);

    let snapshot: Vec<TensorType> = g.values.iter().map(|v| v.ty.clone()).collect();
    assert_eq!(g.analyse(&InferenceConfig::default()).unwrap(), 1);
    let again: Vec<TensorType> = g.values.iter().map(|v| v.ty.clone()).collect();
    assert_eq!(snapshot, again);
}

#[test]
fn reinference_after_an_edit() {
    let mut g = Graph::default();
    let a = g.add_source(TensorType::Unranked(DatumType::F32));
    let b = g.add_source(f32(&[2, 3]));
    let sum = g.wire_node("add", Binary(BinaryOp::Add), &[a, b]).unwrap()[0];
    g.analyse(&InferenceConfig::default()).unwrap();
    assert_eq!(g.value_type(sum).unwrap(), &TensorType::Unranked(DatumType::F32));
    g.set_value_type(a, f32(&[4, 1, 1])).unwrap();
    g.analyse(&InferenceConfig::default()).unwrap();
    assert_eq!(g.value_type(sum).unwrap(), &f32(&[4, 2, 3]));
}

#[test]
fn verification_failures_carry_a_diagnostic() {
    let mut g = Graph::default();
    let a = g.add_source(f32(&[2, 3]));
    let b = g.add_source(f32(&[2, 4]));
    g.wire_node("cat", Concat::new(0), &[a, b]).unwrap();
    let err = g.analyse(&InferenceConfig::default()).unwrap_err();
    let diag = err.downcast_ref::<Diagnostic>().unwrap();
    assert_eq!(
        diag.kind,
        DiagnosticKind::UnexpectedDimensionValue { operand: 1, dim: 1, value: 4, expected: 3 }
    );
    assert!(format!("{err:?}").contains("Verifying #0 \"cat\" onnx.Concat"));
}

#[test]
fn axis_normalized_in_inference_without_canonicalization() {
    let mut g = Graph::default();
    let a = g.add_source(f32(&[2, 3]));
    let b = g.add_source(f32(&[2, 4]));
    let cat = g.wire_node("cat", Concat::new(-1), &[a, b]).unwrap()[0];
    let config = InferenceConfig::default().with_canonicalize(false).with_verify(false);
    g.analyse(&config).unwrap();
    assert_eq!(g.value_type(cat).unwrap(), &f32(&[2, 7]));
    assert_eq!(g.node_by_name("cat").unwrap().op_as::<Concat>().unwrap().axis, -1);
}

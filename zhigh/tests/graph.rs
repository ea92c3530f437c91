use tensil_zhigh::prelude::*;

fn f32(shape: &[i64]) -> TensorType {
    TensorType::ranked(DatumType::F32, shape)
}

fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("TENSIL_LOG").try_init();
}

#[test]
fn conv_pool_reduce_round_trip() {
    setup_test_logger();
    let mut g = Graph::default();
    let x = g.add_source(f32(&[1, 3, 8, 8]));
    let k = g.add_source(f32(&[3, 3, 3, 16]));
    let none = g.add_none();
    let sx = g.wire_node("stick_x", Stick::new(None), &[x]).unwrap()[0];
    let sk = g.wire_node("stick_k", Stick::new(Some(DataLayout::HWCK)), &[k]).unwrap()[0];
    let relu = g.wire_node("relu", ElementWise::new(ElementWiseKind::Relu), &[sx]).unwrap()[0];
    let conv = Conv2d::from_attributes(
        &Attributes::default()
            .with("kernel_shape", [3, 3])
            .with("padding_type", "SAME_PADDING")
            .with("act_func", "ACT_RELU"),
    )
    .unwrap();
    let conv = g.wire_node("conv", conv, &[relu, sk, none]).unwrap()[0];
    let pool = MaxPool2d::from_attributes(
        &Attributes::default().with("kernel_shape", [2, 2]).with("strides", [2, 2]),
    )
    .unwrap();
    let pool = g.wire_node("pool", pool, &[conv]).unwrap()[0];
    let mean = g.wire_node("mean", MeanReduce2d, &[pool]).unwrap()[0];
    let out = g.wire_node("unstick", Unstick, &[mean]).unwrap()[0];

    assert_eq!(g.analyse(&InferenceConfig::default()).unwrap(), 2);
    let conv_ty = g.value_type(conv).unwrap();
    assert_eq!(conv_ty.shape().unwrap(), &[1, 8, 8, 16]);
    assert_eq!(get_ztensor_layout(conv_ty), DataLayout::NHWC);
    assert_eq!(g.value_type(pool).unwrap().shape().unwrap(), &[1, 4, 4, 16]);
    assert_eq!(g.value_type(out).unwrap(), &f32(&[1, 16, 1, 1]));
}

#[test]
fn lstm_on_stickified_gates() {
    let mut g = Graph::default();
    let input = g.add_source(f32(&[5, 2, 3]));
    let input = g.wire_node("stick_in", Stick::new(Some(DataLayout::_3DS)), &[input]).unwrap()[0];
    let mut gates = |name: &str, shape: &[i64]| {
        let parts: Vec<ValueId> = (0..4).map(|_| g.add_source(f32(shape))).collect();
        g.wire_node(name, StickForLstm, &parts).unwrap()[0]
    };
    let w = gates("w", &[1, 3, 8]);
    let r = gates("r", &[1, 8, 8]);
    let wb = gates("wb", &[1, 8]);
    let rb = gates("rb", &[1, 8]);
    let none = g.add_none();
    let lstm = Lstm::from_attributes(
        &Attributes::default().with("hidden_size", 8).with("return_all_steps", -1),
    )
    .unwrap();
    let outputs = g.wire_node("lstm", lstm, &[input, none, none, w, wb, r, rb]).unwrap();
    g.analyse(&InferenceConfig::default()).unwrap();

    assert_eq!(g.value_type(w).unwrap().shape().unwrap(), &[1, 3, 32]);
    assert_eq!(get_ztensor_layout(g.value_type(w).unwrap()), DataLayout::FICO);
    let hn = g.value_type(outputs[0]).unwrap();
    assert_eq!(hn.shape().unwrap(), &[5, 1, 2, 8]);
    assert_eq!(get_ztensor_layout(hn), DataLayout::_4DS);
    assert_eq!(g.value_type(outputs[1]).unwrap().shape().unwrap(), &[1, 1, 2, 8]);
}

#[test]
fn lstm_hidden_size_mismatch_stops_the_analysis() {
    let mut g = Graph::default();
    let input = g.add_source(f32(&[5, 2, 3]));
    let w = g.add_source(f32(&[1, 3, 31]));
    let r = g.add_source(f32(&[1, 8, 32]));
    let none = g.add_none();
    let lstm = Lstm::from_attributes(&Attributes::default().with("hidden_size", 8)).unwrap();
    g.wire_node("lstm", lstm, &[input, none, none, w, none, r, none]).unwrap();
    let err = g.analyse(&InferenceConfig::default()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Diagnostic>().unwrap().kind,
        DiagnosticKind::UnexpectedDimensionValue { operand: 3, dim: 2, value: 31, expected: 32 }
    );
}

#[test]
fn matmul_layout_mismatch() {
    let mut g = Graph::default();
    let x = g.add_source(f32(&[4, 6]));
    let y = g.add_source(f32(&[2, 6, 5]));
    let none = g.add_none();
    let sx = g.wire_node("sx", Stick::new(None), &[x]).unwrap()[0];
    let sy = g.wire_node("sy", Stick::new(Some(DataLayout::_3DS)), &[y]).unwrap()[0];
    g.wire_node("mm", MatMul, &[sx, sy, none]).unwrap();
    let err = g.analyse(&InferenceConfig::default()).unwrap_err();
    assert!(format!("{err:?}").contains("Verifying #2 \"mm\" zhigh.MatMul"));
    assert_eq!(
        err.downcast_ref::<Diagnostic>().unwrap().kind,
        DiagnosticKind::InvalidLayout { operand: 1, layout: "3DS".into(), expected: "2D".into() }
    );
}

#[test]
fn matmul_stacked_by_2d() {
    let mut g = Graph::default();
    let x = g.add_source(f32(&[2, 4, 6]));
    let y = g.add_source(f32(&[6, DYNAMIC]));
    let b = g.add_source(f32(&[DYNAMIC]));
    let sx = g.wire_node("sx", Stick::new(Some(DataLayout::_3DS)), &[x]).unwrap()[0];
    let sy = g.wire_node("sy", Stick::new(None), &[y]).unwrap()[0];
    let sb = g.wire_node("sb", Stick::new(None), &[b]).unwrap()[0];
    let mm = g.wire_node("mm", MatMul, &[sx, sy, sb]).unwrap()[0];
    g.analyse(&InferenceConfig::default()).unwrap();
    let ty = g.value_type(mm).unwrap();
    assert_eq!(ty.shape().unwrap(), &[2, 4, DYNAMIC]);
    assert_eq!(get_ztensor_layout(ty), DataLayout::_3DS);
}

#[test]
fn mixed_layout_add_fails_on_a_single_pass() {
    for max_passes in [1, 4] {
        let mut g = Graph::default();
        let a = g.add_source(f32(&[1, 3, 8, 8]));
        let b = g.add_source(f32(&[1, 8, 8, 3]));
        let sa = g.wire_node("sa", Stick::new(Some(DataLayout::NHWC)), &[a]).unwrap()[0];
        let sb = g.wire_node("sb", Stick::new(Some(DataLayout::NCHW)), &[b]).unwrap()[0];
        g.wire_node("add", ElementWise::new(ElementWiseKind::Add), &[sa, sb]).unwrap();
        let err = g.analyse(&InferenceConfig::default().with_max_passes(max_passes)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Diagnostic>().unwrap().to_string(),
            "'zhigh.Add' op requires the same layout for all operands and results"
        );
    }
}

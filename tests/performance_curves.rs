use approx::assert_relative_eq;
use diesel_engine_simulator::performance::*;

#[test]
fn speed_curves() {
    let inputs = PerformanceInputs::default();
    let speeds = default_speeds();
    let curves = speed_sweep(&inputs, &speeds).unwrap();
    assert_eq!(curves.len(), 100);
    assert_relative_eq!(curves.abscissa[0], 1000.0);

    for i in 0..curves.len() {
        assert_relative_eq!(curves.power[i], calc_power(curves.torque[i], speeds[i]), max_relative = 1e-12);
        assert_relative_eq!(
            curves.specific_consumption[i] * (curves.power[i] + POWER_FLOOR),
            curves.specific_consumption[0] * (curves.power[0] + POWER_FLOOR),
            max_relative = 1e-9
        );
    }
    // power grows monotonically with speed in the swept range
    assert!(curves.power.windows(2).into_iter().all(|w| w[1] > w[0]));
}

#[test]
fn bore_curves_scale_with_piston_area() {
    let inputs = PerformanceInputs::default();
    let curves = bore_sweep(&inputs, &default_bores(), 3000.0).unwrap();
    assert_eq!(curves.len(), 11);
    let ratio = (curves.abscissa[10] / curves.abscissa[0]).powi(2);
    assert_relative_eq!(curves.torque[10] / curves.torque[0], ratio, max_relative = 1e-12);
    assert_relative_eq!(curves.power[10] / curves.power[0], ratio, max_relative = 1e-12);
    assert!(curves.specific_consumption[10] < curves.specific_consumption[0]);
}

#[test]
fn writes_tables() {
    let inputs = PerformanceInputs::default();
    let curves = bore_sweep(&inputs, &default_bores(), 3000.0).unwrap();
    let path = std::env::temp_dir().join(format!("diesel_bore_{}.txt", std::process::id()));
    curves.write_to(&path, "bore [m]").unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("bore [m]\ttorque [N.m]"));
    assert_eq!(lines.count(), 11);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn inputs_from_json() {
    let inputs: PerformanceInputs = serde_json::from_str(r#"{"n_cylinders": 6.0}"#).unwrap();
    assert_relative_eq!(inputs.n_cylinders, 6.0);
    assert_relative_eq!(inputs.displacement, 24.2e-3);
    assert!(inputs.validate().is_ok());
}

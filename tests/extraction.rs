mod common;

use common::{
    frame, full_overlay, init_logging, overlay_frame, overlay_without, Answer, ScriptedOracle,
};
use overlay_geotag::{
    extract, Allowlist, Band, ConfidenceBands, ExtractionOutcome, OracleError, Roi, RoiLayout,
};

#[test]
fn wrong_resolution_never_reaches_the_recognizer() {
    init_logging();
    let oracle = ScriptedOracle::new(vec![full_overlay()]);
    let outcome = extract(&frame(1280, 720), &RoiLayout::default(), &oracle)
        .expect("Mismatch is not a fault");
    assert_eq!(
        outcome,
        ExtractionOutcome::DimensionMismatch {
            width: 1280,
            height: 720
        }
    );
    assert!(outcome.extraction().is_none());
    assert_eq!(oracle.calls(), 0);
}

#[test]
fn every_region_gets_its_allowlist_and_tuning() {
    init_logging();
    let oracle = ScriptedOracle::new(vec![full_overlay()]);
    let layout = RoiLayout::default();
    extract(&overlay_frame(0), &layout, &oracle).expect("Failed extraction");

    let requests = oracle.requests();
    assert_eq!(requests.len(), 8);
    for (roi, request) in Roi::ALL.into_iter().zip(&requests) {
        assert_eq!(request.allowlist, roi.allowlist());
        let tuning = layout.get(roi).tuning;
        assert_eq!(request.upscale_ratio, tuning.upscale_ratio);
        assert_eq!(request.confidence_floor, tuning.confidence_floor);
    }
    assert_eq!(requests[Roi::LatDir.index()].allowlist, Allowlist::NORTH_SOUTH);
    assert_eq!(requests[Roi::LonDir.index()].allowlist, Allowlist::EAST_WEST);
    assert_eq!(requests[Roi::LonSs.index()].allowlist, Allowlist::DIGITS);
}

#[test]
fn complete_overlay_yields_both_axes() {
    init_logging();
    let oracle = ScriptedOracle::new(vec![full_overlay()]);
    let outcome = extract(&overlay_frame(0), &RoiLayout::default(), &oracle).unwrap();
    let extraction = outcome.extraction().expect("Frame has overlay size");

    assert!(extraction.is_complete());
    assert!(extraction.missing().is_empty());
    let latitude = extraction.latitude().expect("Latitude read");
    assert_eq!(latitude.to_string(), "46 : 30 : 36N");
    let longitude = extraction.longitude().expect("Longitude read");
    assert_eq!(longitude.to_string(), "7 : 30 : 00E");
    assert_eq!(extraction.band(&ConfidenceBands::default()), Some(Band::High));
}

#[test]
fn missing_hemisphere_only_fails_its_own_axis() {
    init_logging();
    let oracle = ScriptedOracle::new(vec![overlay_without(&[Roi::LonDir])]);
    let outcome = extract(&overlay_frame(0), &RoiLayout::default(), &oracle).unwrap();
    let extraction = outcome.extraction().unwrap();

    assert_eq!(extraction.missing(), vec![Roi::LonDir]);
    assert_eq!(
        extraction
            .missing()
            .iter()
            .map(|roi| roi.name())
            .collect::<Vec<_>>(),
        vec!["lon_dir_text"]
    );
    assert!(extraction.latitude().is_some());
    assert!(extraction.longitude().is_none());
    assert_eq!(oracle.calls(), 8);
}

#[test]
fn weakest_link_drives_the_band() {
    init_logging();
    let mut script = overlay_without(&[Roi::LonDd, Roi::LonMm, Roi::LonSs, Roi::LonDir]);
    script.insert(Roi::LatDd, Answer::Text("46", 0.95));
    script.insert(Roi::LatMm, Answer::Text("30", 0.50));
    script.insert(Roi::LatSs, Answer::Text("36", 0.92));
    script.insert(Roi::LatDir, Answer::Text("N", 0.91));
    let oracle = ScriptedOracle::new(vec![script]);

    let outcome = extract(&overlay_frame(0), &RoiLayout::default(), &oracle).unwrap();
    let extraction = outcome.extraction().unwrap();
    assert_eq!(extraction.weakest_link(), Some((Roi::LatMm, 0.50)));
    assert_eq!(
        extraction.band(&ConfidenceBands::default()),
        Some(Band::Medium)
    );
}

#[test]
fn blank_candidates_count_as_unread() {
    init_logging();
    let mut script = full_overlay();
    script.insert(Roi::LatSs, Answer::Text("   ", 0.99));
    let oracle = ScriptedOracle::new(vec![script]);

    let outcome = extract(&overlay_frame(0), &RoiLayout::default(), &oracle).unwrap();
    let extraction = outcome.extraction().unwrap();
    assert_eq!(extraction.missing(), vec![Roi::LatSs]);
    assert!(extraction.latitude().is_none());
    assert!(extraction.longitude().is_some());
}

#[test]
fn only_the_top_candidate_is_consumed() {
    init_logging();
    let mut script = full_overlay();
    script.insert(Roi::LatMm, Answer::Ranked(&[("  ", 0.97), ("30", 0.90)]));
    script.insert(Roi::LonMm, Answer::Ranked(&[("31", 0.80), ("30", 0.75)]));
    let oracle = ScriptedOracle::new(vec![script]);

    let outcome = extract(&overlay_frame(0), &RoiLayout::default(), &oracle).unwrap();
    let extraction = outcome.extraction().unwrap();
    assert_eq!(extraction.missing(), vec![Roi::LatMm]);
    assert!(extraction.latitude().is_none());
    let lon_mm = extraction.reading(Roi::LonMm).unwrap();
    assert_eq!((lon_mm.text.as_str(), lon_mm.confidence), ("31", 0.80));
}

#[test]
fn recognizer_fault_is_not_an_empty_result() {
    init_logging();
    let mut script = full_overlay();
    script.insert(Roi::LatSs, Answer::Fault);
    let oracle = ScriptedOracle::new(vec![script]);

    let fault = extract(&overlay_frame(0), &RoiLayout::default(), &oracle)
        .expect_err("Fault must surface");
    assert_eq!(fault.roi, Roi::LatSs);
    assert!(matches!(fault.source, OracleError::Decode(_)));
    // Extraction stops at the failing region.
    assert_eq!(oracle.calls(), Roi::LatSs.index() + 1);
}

#[test]
fn same_answers_give_same_extraction() {
    init_logging();
    let script = overlay_without(&[Roi::LatDd]);
    let oracle = ScriptedOracle::new(vec![script]);
    let image = overlay_frame(0);
    let layout = RoiLayout::default();

    let first = extract(&image, &layout, &oracle).unwrap();
    let second = extract(&image, &layout, &oracle).unwrap();
    assert_eq!(first, second);
    assert_eq!(oracle.calls(), 16);
}

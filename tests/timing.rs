mod common;

use crate::common::*;
use fluxcell::prelude::*;

fn pll() -> Pll {
    Pll::from_preset(PllPreset::Aggressive, DiskDataRate::Rate250Kbps).unwrap()
}

/// Build an uncued capture of `flux`: the tail of the revolution is read before the first index.
fn uncued_capture(flux: &FluxTiming, lead_ct: usize) -> FluxTiming {
    let intervals = flux.intervals();
    let lead = &intervals[intervals.len() - lead_ct..];
    let lead_ticks: f64 = lead.iter().sum();
    let rev = flux.index_positions()[0];

    let mut captured = lead.to_vec();
    captured.extend_from_slice(intervals);
    FluxTiming::from_index_deltas(&[lead_ticks, rev], captured, flux.sample_frequency(), false).unwrap()
}

#[test]
fn test_uncued_capture() {
    init();
    let bits = random_mfm_track(21);
    let master = MasterTrack::new(bits.clone(), DiskRpm::Rpm300.index_time()).unwrap();
    let flux = master.flux().unwrap();

    let capture = uncued_capture(&flux, 500);
    assert!(!capture.is_index_cued());
    assert_eq!(capture.revolution_count(), 1);

    // The PLL discards the partial leading revolution itself.
    let track = pll().decode(&capture);
    assert!(track.stats().discarded_bits > 0);
    assert_eq!(track.revolution_bits(0).unwrap(), bits);

    // Cueing first gives the same result.
    let mut cued = capture.clone();
    cued.cue_at_index().unwrap();
    assert!(cued.is_index_cued());
    assert_eq!(cued.index_positions(), flux.index_positions());
    let track = pll().decode(&cued);
    assert_eq!(track.stats().discarded_bits, 0);
    assert_eq!(track.revolution_bits(0).unwrap(), bits);
}

#[test]
fn test_uncued_capture_decodes_sectors() {
    init();
    let ch = DiskCh::new(1, 1);
    let source = filled_track(TrackFormat::Ibm360, ch, 22);
    let capture = uncued_capture(&source.flux().unwrap(), 2000);

    let mut decoded = TrackFormat::Ibm360.codec(ch);
    decoded.decode_flux(&capture, &[]).unwrap();
    assert_eq!(decoded.nr_missing(), 0);
}

#[test]
fn test_extend_revolutions() {
    init();
    let bits = random_mfm_track(23);
    let n = bits.len();
    let master = MasterTrack::new(bits.clone(), DiskRpm::Rpm300.index_time()).unwrap();
    let mut flux = master.flux().unwrap();

    flux.set_revolution_count(3).unwrap();
    assert_eq!(flux.revolution_count(), 3);
    assert_eq!(flux.index_positions(), &[n as f64, 2.0 * n as f64, 3.0 * n as f64]);

    let track = pll().decode(&flux);
    assert_eq!(track.revolutions(), &[n, n, n]);
    for rev in 0..3 {
        assert_eq!(track.revolution_bits(rev).unwrap(), bits, "revolution {}", rev);
    }

    flux.set_revolution_count(1).unwrap();
    assert_eq!(flux.revolution_count(), 1);
    // The flux straddling the final index is kept.
    assert!(flux.total_ticks() > n as f64 && flux.total_ticks() < n as f64 + 8.0);
    let track = pll().decode(&flux);
    assert_eq!(track.revolution_bits(0).unwrap(), bits);
}

#[test]
fn test_writeout_from_capture() {
    init();
    let source = filled_track(TrackFormat::Ibm360, DiskCh::new(0, 0), 24);
    let flux = source.flux().unwrap();

    // A cued capture with no splice is written with a footer.
    let out = flux.flux_for_writeout(true).unwrap();
    let ratio = out.total_ticks() / flux.index_positions()[0];
    assert!(ratio >= 1.1 && ratio < 1.101, "ratio: {}", ratio);

    // An uncued capture needs a splice to know where to write from.
    let mut capture = uncued_capture(&flux, 300);
    assert_eq!(capture.flux_for_writeout(true), Err(FluxError::NotIndexCued));
    capture.set_splice_offset(Some(1.0e6));
    assert!(matches!(
        capture.flux_for_writeout(true),
        Err(FluxError::SpliceOutOfRange { .. })
    ));
    capture.set_splice_offset(Some(50_000.0));
    let out = capture.flux_for_writeout(true).unwrap();
    assert!(out.total_ticks() >= 150_000.0);
    assert_eq!(out.splice_offset(), Some(50_000.0));

    let mut decoded = TrackFormat::Ibm360.codec(DiskCh::new(0, 0));
    decoded.decode_flux(&out, &[]).unwrap();
    assert_eq!(decoded.nr_missing(), 0);
}

mod common;

use crate::common::*;
use bit_vec::BitVec;
use fluxcell::prelude::*;

fn pll_250k(preset: PllPreset) -> Pll {
    Pll::from_preset(preset, DiskDataRate::Rate250Kbps).unwrap()
}

#[test]
fn test_master_track_round_trip() {
    init();
    let bits = random_mfm_track(0x1234);
    let master = MasterTrack::new(bits.clone(), DiskRpm::Rpm300.index_time()).unwrap();
    let flux = master.flux().unwrap();

    let track = pll_250k(PllPreset::Aggressive).decode(&flux);
    assert_eq!(track.revolutions(), &[bits.len()]);
    assert_eq!(track.revolution_bits(0).unwrap(), bits);
    assert_eq!(track.stats().discarded_bits, 0);
}

#[test]
fn test_round_trip_via_iterator() {
    init();
    let bits = random_mfm_track(0x55);
    let master = MasterTrack::new(bits.clone(), DiskRpm::Rpm300.index_time()).unwrap();
    let flux = master.flux().unwrap();

    // Any pull-based source of intervals can feed the PLL.
    let pll = pll_250k(PllPreset::Aggressive);
    let track = pll.decode_iter(
        flux.intervals().iter().copied(),
        flux.sample_frequency(),
        flux.index_positions(),
        true,
    );
    assert_eq!(track.revolution_bits(0).unwrap(), bits);
}

#[test]
fn test_revolution_partition() {
    init();
    let bits = random_mfm_track(0x99);
    let n = bits.len();
    let master = MasterTrack::new(bits, DiskRpm::Rpm300.index_time())
        .unwrap()
        .with_splice(n / 2)
        .unwrap();
    let flux = master.flux().unwrap();
    assert_eq!(flux.revolution_count(), 2);

    let track = pll_250k(PllPreset::Aggressive).decode(&flux);
    assert_eq!(track.revolution_count(), 2);
    assert_eq!(track.revolutions().iter().sum::<usize>(), track.len());
    for rev in 0..track.revolution_count() {
        let range = track.revolution_range(rev).unwrap();
        assert_eq!(range.len(), n);
        let time = track.revolution_time(rev).unwrap();
        assert!((time - 0.2).abs() < 1e-4, "revolution {} time: {}", rev, time);
    }
}

#[test]
fn test_jitter_robustness() {
    init();
    let bits = random_mfm_track(0xBEEF);
    let master = MasterTrack::new(bits.clone(), DiskRpm::Rpm300.index_time()).unwrap();
    let period = DiskDataRate::Rate250Kbps.bitcell_period();

    for seed in 0..3 {
        let flux = jitter_flux(&master.flux().unwrap(), period, 0.15, seed);
        let track = pll_250k(PllPreset::Aggressive).decode(&flux);
        // Jitter around the index can move the last bit into the next revolution.
        let rev = track.revolution_bits(0).unwrap();
        assert!(rev.len() + 1 >= bits.len() && rev.len() <= bits.len(), "seed {}", seed);
        let expected: BitVec = bits.iter().take(rev.len()).collect();
        assert_eq!(rev, expected, "seed {}", seed);
    }
}

#[test]
fn test_speed_drift() {
    init();
    let bits = random_mfm_track(0x77);
    let master = MasterTrack::new(bits.clone(), DiskRpm::Rpm300.index_time()).unwrap();

    // A drive spinning 3% slow presents every transition 3% late.
    let mut flux = master.flux().unwrap();
    flux.scale(1.03).unwrap();
    let track = pll_250k(PllPreset::Aggressive).decode(&flux);
    assert_eq!(track.revolution_bits(0).unwrap(), bits);
    assert!(track.stats().clock_max > DiskDataRate::Rate250Kbps.bitcell_period());
}

#[test]
fn test_lowpass_rejects_glitches() {
    init();
    let bits = random_mfm_track(0x4242);
    let master = MasterTrack::new(bits.clone(), DiskRpm::Rpm300.index_time()).unwrap();
    let flux = master.flux().unwrap();

    // Split every 100th interval with a spurious transition 0.1 bitcells after its start.
    let mut intervals = Vec::new();
    for (i, x) in flux.intervals().iter().enumerate() {
        if i % 100 == 50 {
            intervals.push(0.1);
            intervals.push(*x - 0.1);
        }
        else {
            intervals.push(*x);
        }
    }
    let glitched = FluxTiming::new(
        flux.index_positions().to_vec(),
        intervals,
        flux.sample_frequency(),
        true,
    )
    .unwrap();

    let track = pll_250k(PllPreset::LowPass).decode(&glitched);
    assert!(track.stats().lowpass_merged > 0);
    assert_eq!(track.revolution_bits(0).unwrap(), bits);
}

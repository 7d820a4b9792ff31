use std::io::Write;

use hammertime::fliptable::ExtrapMode;
use hammertime::memory::DRAMAddr;
use hammertime::{
    Attack, Flip, FlipDirection, FlipTable, FliptableConfig, LegacyTable, Targets,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

/// Two double-sided runs over rows 0x40..0x42 of bank 1; the first attack is
/// logged twice with different corruptions, the second has none.
const PROFILE_A: &str = "\
# run a
(0 0 0 1 40 0) (0 0 0 1 42 0) : (0 0 0 1 41 0) 0010|fe|ff
(0 0 0 1 40 0) (0 0 0 1 42 0) : (0 0 0 1 41 0) 0003|01|00
(0 0 0 1 41 0) (0 0 0 1 43 0) :
(0 0 0 1 42 0) (0 0 0 1 44 0) : (0 0 0 1 43 0) 0000|7f|ff (0 0 0 1 41 0) 0008|ff|fb
";

const PROFILE_B: &str = "\
(0 0 0 1 40 0) (0 0 0 1 42 0) : (0 0 0 1 41 0) 0010|fe|ff
(0 0 0 1 41 0) (0 0 0 1 43 0) : (0 0 0 1 42 0) 0001|00|80
(0 0 0 1 42 0) (0 0 0 1 44 0) : (0 0 0 1 43 0) 0000|7f|ff
";

fn profile_file(contents: &str) -> anyhow::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn flips_of(table: &FlipTable) -> Vec<(DRAMAddr, u32)> {
    let mut flips: Vec<_> = table
        .iter()
        .flat_map(|a| a.flips().iter().map(|f| (f.addr, f.bit)))
        .collect();
    flips.sort();
    flips
}

#[test]
fn profile_to_text_and_back() -> anyhow::Result<()> {
    let profile = profile_file(PROFILE_A)?;
    let table = FlipTable::load(profile.path())?;
    let stats = table.stats();
    assert_eq!(stats.hammers, 3);
    assert_eq!(stats.with_flips, 2);
    assert_eq!(stats.total_flips, 4);

    let dir = tempfile::tempdir()?;
    for baseline in [0xff, 0x00, 0xa5] {
        let config = FliptableConfig {
            baseline,
            ..Default::default()
        };
        let path = dir.path().join(format!("table-{:02x}.txt", baseline));
        table.save_with_config(&path, &config)?;
        assert_eq!(FlipTable::load_with_config(&path, &config)?, table);
    }
    Ok(())
}

#[test]
fn profile_to_binary_and_back() -> anyhow::Result<()> {
    let profile = profile_file(PROFILE_A)?;
    let table = FlipTable::load(profile.path())?;
    let legacy = LegacyTable::from_fliptable(&table, None)?;
    assert_eq!(legacy.dist(), 2);
    assert_eq!(legacy.ranges().len(), 1);
    assert_eq!(legacy.hammers().len(), 3);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("profile.ftbl");
    legacy.write(&path)?;
    let back = LegacyTable::read(&path)?;
    assert_eq!(back.to_fliptable(), table);

    let hit = back
        .lookup(DRAMAddr::new(0, 0, 0, 1, 0x42, 0), ExtrapMode::None)
        .expect("row 0x42 was hammered");
    assert_eq!(hit.row_offset, 0);
    assert_eq!(hit.shifted_flips().count(), 2);
    let extrapolated = back
        .lookup(DRAMAddr::new(0, 0, 0, 1, 0x45, 0), ExtrapMode::PerBank)
        .expect("same bank");
    assert_eq!(extrapolated.row_offset, 3);
    assert!(
        back.lookup(DRAMAddr::new(0, 0, 0, 2, 0x45, 0), ExtrapMode::PerBank)
            .is_none()
    );
    Ok(())
}

#[test]
fn diff_partitions_both_tables() -> anyhow::Result<()> {
    let a = FlipTable::load(profile_file(PROFILE_A)?.path())?;
    let b = FlipTable::load(profile_file(PROFILE_B)?.path())?;
    let diff = a.diff(&b);

    assert_eq!(diff.common.num_flips(), 2);
    assert_eq!(diff.self_only.num_flips(), 2);
    assert_eq!(diff.other_only.num_flips(), 1);

    let mut a_flips = flips_of(&diff.self_only);
    a_flips.extend(flips_of(&diff.common));
    a_flips.sort();
    assert_eq!(a_flips, flips_of(&a));

    let mut b_flips = flips_of(&diff.other_only);
    b_flips.extend(flips_of(&diff.common));
    b_flips.sort();
    assert_eq!(b_flips, flips_of(&b));

    let (b_only, common, a_only) = b.diff(&a).into_tuple();
    assert_eq!(common, diff.common);
    assert_eq!(a_only, diff.self_only);
    assert_eq!(b_only, diff.other_only);
    Ok(())
}

#[test]
fn common_flips_over_profiles() -> anyhow::Result<()> {
    let a = FlipTable::load(profile_file(PROFILE_A)?.path())?;
    let b = FlipTable::load(profile_file(PROFILE_B)?.path())?;
    let common = FlipTable::common_flips([a.clone(), b.clone(), a.clone()]);
    assert_eq!(common, a.diff(&b).common);
    assert_eq!(FlipTable::common_flips([a.clone()]), a);
    Ok(())
}

#[test]
fn attacks_map_to_physical_memory() {
    use hammertime::memory::{AddrResolver, PhysAddr};

    struct RowMajor;
    impl AddrResolver for RowMajor {
        fn resolve(&self, phys: PhysAddr) -> DRAMAddr {
            let v = phys.as_u64();
            DRAMAddr::new(0, 0, 0, (v >> 26) as u8, (v >> 10) as u16, (v & 0x3ff) as u16 / 8)
        }
        fn resolve_reverse(&self, addr: DRAMAddr) -> PhysAddr {
            PhysAddr::new(
                (addr.bank as u64) << 26 | (addr.row as u64) << 10 | (addr.col as u64 * 8),
            )
        }
    }

    let table = FlipTable::load(profile_file(PROFILE_A).unwrap().path()).unwrap();
    let attack: &Attack = table.iter().next().unwrap();
    let phys = attack.to_physmem(&RowMajor);
    assert_eq!(phys.len(), attack.num_flips());
    assert!(phys.windows(2).all(|w| w[0].addr <= w[1].addr));
}

#[test]
fn random_tables_survive_both_encodings() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let dir = tempfile::tempdir()?;
    for round in 0..20 {
        let bank = rng.random_range(0..8u8);
        let attacks: Vec<_> = (0..rng.random_range(1..24))
            .map(|_| {
                let first = DRAMAddr::new(0, 0, 0, bank, rng.random_range(0..64u16), 0);
                let victim = first.add_row(1);
                let flips: Vec<_> = (0..rng.random_range(0..8))
                    .map(|_| {
                        let direction = if rng.random_bool(0.5) {
                            FlipDirection::ZeroToOne
                        } else {
                            FlipDirection::OneToZero
                        };
                        Flip::new(
                            victim.add_col(rng.random_range(0..4u16)),
                            rng.random_range(0..64u32),
                            direction,
                        )
                    })
                    .collect();
                Attack::new(Targets::pair(first, first.add_row(2)), flips)
            })
            .collect();
        let table = FlipTable::new(attacks);

        let config = FliptableConfig {
            baseline: rng.random(),
            ..Default::default()
        };
        let text = dir.path().join(format!("round-{}.txt", round));
        table.save_with_config(&text, &config)?;
        assert_eq!(FlipTable::load_with_config(&text, &config)?, table);

        let legacy = LegacyTable::from_fliptable(&table, None)?;
        let binary = dir.path().join(format!("round-{}.ftbl", round));
        legacy.write(&binary)?;
        assert_eq!(LegacyTable::read(&binary)?.to_fliptable(), table);
    }
    Ok(())
}

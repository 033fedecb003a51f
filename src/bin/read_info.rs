use ramses_plot::{Dataset, Units};
use std::env;

fn main() -> anyhow::Result<()> {
    let path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: read_info <output_NNNNN/info_NNNNN.txt>"))?;
    let dataset = Dataset::load(&path, Units::Cgs)?;
    let info = dataset.info();
    println!(
        "{}: {} cpus, {}D, levels {}..{}, boxlen {}, t = {}",
        dataset.name(),
        info.ncpu,
        info.ndim,
        info.levelmin,
        info.levelmax,
        info.boxlen,
        info.time
    );
    println!(
        "units: l = {:e} cm, d = {:e} g/cm^3, t = {:e} s",
        info.unit_l, info.unit_d, info.unit_t
    );
    for (ivar, name) in dataset.variables().names().iter().enumerate() {
        println!("{:>3} : {}", ivar + 1, name);
    }

    let cells = dataset.leaf_cells()?;
    println!("{} leaf cells", cells.len());
    for (level, n) in cells.level_counts() {
        println!("  level {level:>2}: {n}");
    }
    Ok(())
}

use ramses_plot::PlotBuffer;
use std::{env, fs::File, path::Path};

fn main() -> anyhow::Result<()> {
    for arg in env::args().skip(1) {
        let path = Path::new(&arg);
        println!("{:?}", path);
        let buffer = PlotBuffer::from_bin(path)?;
        let frb = &buffer.frb;
        // row-major rows of the vertical image axis, NaN where no cell was deposited
        let data: Vec<Vec<f64>> = (0..frb.height())
            .map(|j| (0..frb.width()).map(|i| frb.data[(i, j)]).collect())
            .collect();
        serde_pickle::to_writer(
            &mut File::create(path.with_extension("pkl"))?,
            &data,
            Default::default(),
        )?;
    }
    Ok(())
}

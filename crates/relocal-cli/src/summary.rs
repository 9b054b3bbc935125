use console::Style;
use relocal_core::{AlignConfig, Alignment};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    disabled: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            disabled: Style::new().dim().yellow(),
        }
    }
}

pub fn print_alignment_summary(config: &AlignConfig, alignment: &Alignment) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Alignment"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(9)));
    println!();

    println!("  {}", s.header.apply_to("Solver"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Tolerance"),
        s.value.apply_to(config.tolerance)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Max iter"),
        s.value.apply_to(config.max_iterations)
    );
    if config.pyramid_levels == 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Pyramid"),
            s.disabled.apply_to("single level")
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Pyramid"),
            s.value.apply_to(format!("{} levels", config.pyramid_levels + 1))
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Warp"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Theta"),
        s.value.apply_to(format!(
            "{:.6} rad ({:.4}\u{b0})",
            alignment.params.theta,
            alignment.params.theta.to_degrees()
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Tx"),
        s.value.apply_to(format!("{:.4} px", alignment.params.tx))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Ty"),
        s.value.apply_to(format!("{:.4} px", alignment.params.ty))
    );
    println!();

    println!("  {}", s.header.apply_to("Fit"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(alignment.iterations)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("RMS"),
        s.value.apply_to(format!("{:.6}", alignment.residual_rms))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Pixels"),
        s.value.apply_to(alignment.valid_pixels)
    );
    println!();
}

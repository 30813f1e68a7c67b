fn main() -> Result<(), Box<dyn std::error::Error>> {
    mpr_monitor_lib::run()
}

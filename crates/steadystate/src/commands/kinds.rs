use colored::Colorize;
use steadystate_connect::registry;

pub fn handle() {
    for info in registry() {
        println!("{}", info.type_name.bold());
        println!("  {}", info.description);
        println!("  identity:  {}", info.identity.cyan());
        if !info.force_new.is_empty() {
            println!("  force-new: {}", info.force_new.join(", "));
        }
        println!();
    }
}

// whitelist.rs: List an architecture's always-safe syscalls.

use clap::Args;
use tg_policy::Architecture;

#[derive(Args)]
pub struct WhitelistArgs {
    /// Architecture (x86_64, amd64, i686, i386, ...). Defaults to the host.
    #[arg(long)]
    arch: Option<Architecture>,
}

pub fn execute(args: &WhitelistArgs) -> anyhow::Result<()> {
    let arch = match args.arch {
        Some(arch) => arch,
        None => Architecture::host()?,
    };
    let profile = arch.profile();
    let special = profile.special();

    println!("{} safe syscalls ({}):", arch, profile.safe_syscalls().len());
    for (number, name) in profile.safe_syscalls() {
        println!("  {:>4}  {}", number, name);
    }
    println!(
        "checked separately: open #{}, unlink #{}, exit_group #{}",
        special.open, special.unlink, special.exit_group
    );
    Ok(())
}
